/// Observable state of a [`DataSource`](super::DataSource).
///
/// The whole struct lives in one `Mutable`, so fields that change together
/// (e.g. clearing `error` and leaving `initial_state` on success) are seen
/// together by every observer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState<T, E> {
    /// Last successfully produced value.
    pub data: Option<T>,
    /// A source invocation is outstanding.
    pub loading: bool,
    /// Failure of the current invocation, cleared by the next value.
    pub error: Option<E>,
    /// No value has been produced since creation or the last reset.
    pub initial_state: bool,
}

impl<T, E> Default for SourceState<T, E> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            initial_state: true,
        }
    }
}

impl<T, E> SourceState<T, E> {
    pub fn is_first_loading(&self) -> bool {
        self.loading && self.initial_state
    }

    pub fn is_after_first_loading(&self) -> bool {
        self.loading && !self.initial_state
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn begin_run(&mut self) {
        self.loading = true;
    }

    /// Returns `true` when `data` actually changed.
    pub(crate) fn apply_value(&mut self, value: T) -> bool
    where
        T: PartialEq,
    {
        self.error = None;
        self.initial_state = false;
        if self.data.as_ref() == Some(&value) {
            return false;
        }
        self.data = Some(value);
        true
    }

    pub(crate) fn apply_failure(&mut self, error: E) {
        self.error = Some(error);
        self.initial_state = false;
        self.loading = false;
    }

    pub(crate) fn finish_run(&mut self) {
        self.loading = false;
    }

    /// Returns `true` when there was data to clear.
    pub(crate) fn clear_data(&mut self) -> bool {
        self.data.take().is_some()
    }

    /// Back to the creation state, except for `loading`. Returns `true` when
    /// there was data to clear.
    pub(crate) fn reset(&mut self) -> bool {
        self.initial_state = true;
        self.error = None;
        self.clear_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type State = SourceState<Vec<u32>, String>;

    #[test]
    fn test_derived_flags() {
        let mut state = State::default();
        assert!(!state.is_first_loading());
        assert!(!state.is_after_first_loading());

        state.begin_run();
        assert!(state.is_first_loading());
        assert!(!state.is_after_first_loading());

        assert!(state.apply_value(vec![1]));
        assert!(!state.is_first_loading());
        assert!(state.is_after_first_loading());

        state.finish_run();
        assert!(!state.is_first_loading());
        assert!(!state.is_after_first_loading());
    }

    #[test]
    fn test_equal_value_is_not_a_change() {
        let mut state = State::default();
        assert!(state.apply_value(vec![1, 2]));
        assert!(!state.apply_value(vec![1, 2]));
        assert!(state.apply_value(vec![3]));
        assert_eq!(state.data, Some(vec![3]));
    }

    #[test]
    fn test_failure_keeps_stale_data() {
        let mut state = State::default();
        state.begin_run();
        state.apply_value(vec![1]);
        state.apply_failure("offline".to_string());

        assert_eq!(state.data, Some(vec![1]));
        assert!(state.has_error());
        assert!(!state.loading);

        state.apply_value(vec![1]);
        assert!(!state.has_error());
    }

    #[test]
    fn test_failure_leaves_initial_state() {
        let mut state = State::default();
        state.begin_run();
        state.apply_failure("offline".to_string());
        assert!(!state.initial_state);
        assert_eq!(state.data, None);
    }

    #[test]
    fn test_clear_and_reset() {
        let mut state = State::default();
        state.apply_value(vec![1]);
        state.apply_failure("offline".to_string());

        assert!(state.clear_data());
        assert!(!state.clear_data());
        assert!(!state.initial_state);
        assert!(state.has_error());

        state.apply_value(vec![2]);
        state.begin_run();
        assert!(state.reset());
        assert_eq!(state, State { loading: true, ..State::default() });
    }
}
