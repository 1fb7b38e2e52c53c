use messenger_api::{Field, MessageCandidate, ValidationError};

/// Structural checks applied to every candidate before persistence.
///
/// Rules run in a fixed order: `content`, then `sequenceNumber`.
/// A caller-supplied `createdAt` is never inspected.
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    max_content_len: usize,
}

impl ValidationPolicy {
    pub fn new(max_content_len: usize) -> Self {
        Self { max_content_len }
    }

    pub fn max_content_len(&self) -> usize {
        self.max_content_len
    }

    /// First violation, if any.
    pub fn validate(&self, candidate: &MessageCandidate) -> Result<(), ValidationError> {
        match self.violations(candidate).next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every violation, in rule order.
    pub fn validate_all(&self, candidate: &MessageCandidate) -> Vec<ValidationError> {
        self.violations(candidate).collect()
    }

    fn violations<'a>(
        &'a self,
        candidate: &'a MessageCandidate,
    ) -> impl Iterator<Item = ValidationError> + 'a {
        self.check_content(&candidate.content)
            .into_iter()
            .chain(check_sequence_number(candidate.sequence_number))
    }

    fn check_content(&self, content: &str) -> Option<ValidationError> {
        if content.trim().is_empty() {
            return Some(ValidationError::new(Field::Content, "must not be empty"));
        }
        // Length is counted in chars, not bytes.
        let len = content.chars().count();
        if len > self.max_content_len {
            return Some(ValidationError::new(
                Field::Content,
                format!("must be at most {} characters, got {len}", self.max_content_len),
            ));
        }
        None
    }
}

fn check_sequence_number(n: i64) -> Option<ValidationError> {
    (n < 0).then(|| ValidationError::new(Field::SequenceNumber, "must be non-negative"))
}
