use crate::models::{DateRange, Provider, VegetationIndex};

/// Active provider, index and date range. Each setter reports whether the value
/// actually changed so callers can skip redundant triggers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    provider: Option<Provider>,
    index: VegetationIndex,
    date_range: DateRange,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(&self) -> Option<Provider> {
        self.provider
    }

    pub fn index(&self) -> VegetationIndex {
        self.index
    }

    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn set_provider(&mut self, provider: Option<Provider>) -> bool {
        let changed = self.provider != provider;
        self.provider = provider;
        changed
    }

    pub fn set_index(&mut self, index: VegetationIndex) -> bool {
        let changed = self.index != index;
        self.index = index;
        changed
    }

    pub fn set_date_range(&mut self, date_range: DateRange) -> bool {
        let changed = self.date_range != date_range;
        self.date_range = date_range;
        changed
    }
}
