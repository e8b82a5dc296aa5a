/// Whether the session is interpreting lines as commands or capturing
/// message data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Command,
    DataCapture,
}

/// The in-flight mail transaction of one session.
///
/// Cleared after every relay attempt, successful or not, and by `RSET`.
#[derive(Debug, Default)]
pub struct Transaction {
    pub mail_from: String,
    pub rcpt_to: String,
    body: String,
    mode: Mode,
}

impl Transaction {
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// `DATA` is only legal once both envelope fields have been supplied.
    #[must_use]
    pub fn ready_for_data(&self) -> bool {
        !self.mail_from.is_empty() && !self.rcpt_to.is_empty()
    }

    pub fn begin_data(&mut self) {
        self.mode = Mode::DataCapture;
    }

    /// Append one captured line, re-suffixed with CRLF.
    pub fn push_line(&mut self, line: &str) {
        self.body.push_str(line);
        self.body.push_str("\r\n");
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::{Mode, Transaction};

    #[test]
    fn captured_lines_are_crlf_terminated() {
        let mut txn = Transaction::default();
        txn.push_line("Subject: hi");
        txn.push_line("");
        txn.push_line("Hello");
        assert_eq!(txn.body(), "Subject: hi\r\n\r\nHello\r\n");
    }

    #[test]
    fn reset_clears_everything() {
        let mut txn = Transaction {
            mail_from: "<a@x.com>".to_owned(),
            rcpt_to: "<b@y.com>".to_owned(),
            ..Transaction::default()
        };
        txn.begin_data();
        txn.push_line("Hello");

        txn.reset();
        assert_eq!(txn.mode(), Mode::Command);
        assert!(txn.mail_from.is_empty());
        assert!(txn.rcpt_to.is_empty());
        assert!(txn.body().is_empty());
    }
}
