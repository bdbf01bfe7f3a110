use uuid::Uuid;

/// Single-flight correlation slot of a persistent connection.
///
/// Only the transport's `request` operation reads or writes it, and only one request is in
/// flight at a time, so a single staged id is enough.
#[derive(Debug, Default)]
pub(crate) struct CorrelationState {
    next_id: Option<String>,
    last_id: Option<String>,
}

impl CorrelationState {
    /// Stages a caller supplied id for the next request.
    pub(crate) fn stage(&mut self, id: String) {
        self.next_id = Some(id);
    }

    /// Consumes the staged id, or generates a fresh one, and remembers it as the last id.
    pub(crate) fn issue(&mut self) -> String {
        let id = self
            .next_id
            .take()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.last_id = Some(id.clone());
        id
    }

    pub(crate) fn last(&self) -> Option<&str> {
        self.last_id.as_deref()
    }
}
