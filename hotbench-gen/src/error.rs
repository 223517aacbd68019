/// A problem found while generating benchmark sources
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", location(.class, .line), .message)]
pub struct GenerationError {
    /// Class the problem was found in, if any
    pub class: Option<String>,
    /// 1-based source line, when known
    pub line: Option<usize>,
    /// Description
    pub message: String,
}

impl GenerationError {
    /// Error not tied to a class
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            class: None,
            line: None,
            message: message.into(),
        }
    }

    /// Error found in `class`
    pub fn in_class(class: &str, message: impl Into<String>) -> Self {
        Self {
            class: Some(class.to_string()),
            line: None,
            message: message.into(),
        }
    }

    /// Attach a source line
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

fn location(class: &Option<String>, line: &Option<usize>) -> String {
    match (class, line) {
        (Some(class), Some(line)) => format!("{class}:{line}: "),
        (Some(class), None) => format!("{class}: "),
        (None, _) => String::new(),
    }
}
