use crate::calendar::CalendarMonth;
use chrono::NaiveDate;
use serde::Serialize;

/// Anchor and cursor of a drag gesture, in either temporal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectionRange {
    pub anchor: NaiveDate,
    pub cursor: NaiveDate,
}

impl SelectionRange {
    pub fn new(anchor: NaiveDate, cursor: NaiveDate) -> Self {
        Self { anchor, cursor }
    }

    pub fn start(&self) -> NaiveDate {
        self.anchor.min(self.cursor)
    }

    pub fn end(&self) -> NaiveDate {
        self.anchor.max(self.cursor)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start() <= date && date <= self.end()
    }

    /// Inclusive day sequence from the earlier to the later endpoint.
    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end();
        self.start().iter_days().take_while(move |day| *day <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

/// Turns pointer gestures on a month grid into a selection range.
///
/// Presses and drags only register on days of the displayed month. The range
/// survives pointer release so controls can act on it afterwards, and only
/// an explicit clear or a new press replaces it.
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    month: CalendarMonth,
    state: DragState,
    range: Option<SelectionRange>,
}

impl SelectionEngine {
    pub fn new(month: CalendarMonth) -> Self {
        Self {
            month,
            state: DragState::Idle,
            range: None,
        }
    }

    pub fn month(&self) -> CalendarMonth {
        self.month
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    pub fn range(&self) -> Option<SelectionRange> {
        self.range
    }

    pub fn pointer_down(&mut self, date: NaiveDate) {
        if !self.month.contains(date) {
            return;
        }
        self.state = DragState::Dragging;
        self.range = Some(SelectionRange::new(date, date));
    }

    pub fn pointer_enter(&mut self, date: NaiveDate) {
        if !self.is_dragging() || !self.month.contains(date) {
            return;
        }
        if let Some(range) = self.range.as_mut() {
            range.cursor = date;
        }
    }

    /// Ends a drag wherever the pointer was released; the range is kept.
    pub fn pointer_up(&mut self) {
        if self.is_dragging() {
            self.state = DragState::Idle;
        }
    }

    pub fn clear_selection(&mut self) {
        self.state = DragState::Idle;
        self.range = None;
    }

    pub fn show_month(&mut self, month: CalendarMonth) {
        self.month = month;
    }

    pub fn next_month(&mut self) {
        self.month = self.month.next();
    }

    pub fn prev_month(&mut self) {
        self.month = self.month.prev();
    }

    /// Days of the range that fall inside the displayed month.
    pub fn selected_days(&self) -> Vec<NaiveDate> {
        let Some(range) = self.range else {
            return Vec::new();
        };
        range.days().filter(|day| self.month.contains(*day)).collect()
    }

    pub fn is_selected(&self, date: NaiveDate) -> bool {
        self.month.contains(date) && self.range.is_some_and(|range| range.contains(date))
    }
}
