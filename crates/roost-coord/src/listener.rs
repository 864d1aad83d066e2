//! Child-change listener trait and closure adapter

/// Trait for receiving child-change notifications.
///
/// Implement this to be notified when the direct children of a subscribed
/// parent node change (a child was created or deleted).
///
/// Implementations are invoked on the store's delivery task and must return
/// quickly; they must tolerate redundant invocations for the same logical
/// change and invocations that arrive after the subscriber has lost interest.
pub trait ChildListener: Send + Sync + 'static {
    /// Called with the full current child list of `parent_path`.
    fn on_children_changed(&self, parent_path: &str, children: &[String]);
}

/// A simple listener that invokes a closure.
pub struct FnChildListener<F>
where
    F: Fn(&str, &[String]) + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnChildListener<F>
where
    F: Fn(&str, &[String]) + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ChildListener for FnChildListener<F>
where
    F: Fn(&str, &[String]) + Send + Sync + 'static,
{
    fn on_children_changed(&self, parent_path: &str, children: &[String]) {
        (self.f)(parent_path, children);
    }
}
