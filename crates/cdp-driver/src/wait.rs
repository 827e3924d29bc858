/// Named wait conditions the driver polls until satisfied or deadline.
#[derive(Clone, Debug)]
pub enum WaitGate {
    /// `document.readyState` is interactive or complete.
    DomReady,
    /// A boolean JS expression evaluates to true.
    Condition { expression: String },
}

impl WaitGate {
    /// Short label used in timeout hints.
    pub fn label(&self) -> &'static str {
        match self {
            WaitGate::DomReady => "dom-ready",
            WaitGate::Condition { .. } => "condition",
        }
    }
}
