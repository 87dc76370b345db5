//! Expense aggregate: status, approver queue, vote ledger and comments.
//!
//! The aggregate is mutated exclusively through the decision engine; votes
//! and comments are append-only and the queue rejects duplicates by
//! construction.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ExpenseStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
}

impl ExpenseStatus {
    /// Approved and Rejected are terminal; no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Decision {
    #[n(0)]
    Approve,
    #[n(1)]
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Vote {
    #[n(0)]
    pub user: String,
    #[n(1)]
    pub decision: Decision,
    #[n(2)]
    pub cast_at: TimeStamp<Utc>,
}

/// Ordered set of usernames still owed a decision.
///
/// Membership is checked on every append, so the queue never holds the same
/// username twice regardless of how the chain, rule pools and condition
/// matches overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
#[cbor(transparent)]
pub struct ApproverQueue(#[n(0)] Vec<String>);

impl ApproverQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.0.iter().any(|u| u == username)
    }

    /// Appends the username unless already queued. Returns whether it was added.
    pub fn enqueue(&mut self, username: impl Into<String>) -> bool {
        let username = username.into();
        if self.contains(&username) {
            return false;
        }
        self.0.push(username);
        true
    }

    /// Removes the username from the queue. Returns whether it was present.
    pub fn remove(&mut self, username: &str) -> bool {
        match self.0.iter().position(|u| u == username) {
            Some(idx) => {
                self.0.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

impl<S: Into<String>> FromIterator<S> for ApproverQueue {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut queue = Self::new();
        for username in iter {
            queue.enqueue(username);
        }
        queue
    }
}

/// The persisted unit of the workflow.
///
/// Status, queue, votes and comments only change through the methods below
/// and are written back as one atomic record per decision.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Expense {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub employee: String,
    #[n(2)]
    pub amount: u64, // minor currency units
    #[n(3)]
    pub currency: String,
    #[n(4)]
    pub category: String,
    #[n(5)]
    pub description: String,
    #[n(6)]
    status: ExpenseStatus,
    #[n(7)]
    approvers: ApproverQueue,
    #[n(8)]
    votes: Vec<Vote>,
    #[n(9)]
    comments: Vec<String>,
    #[n(10)]
    pub submitted_at: TimeStamp<Utc>,
}

impl Expense {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        employee: String,
        amount: u64,
        currency: String,
        category: String,
        description: String,
        approvers: ApproverQueue,
        submitted_at: TimeStamp<Utc>,
    ) -> Self {
        Self {
            id,
            employee,
            amount,
            currency,
            category,
            description,
            status: ExpenseStatus::Pending,
            approvers,
            votes: Vec::new(),
            comments: Vec::new(),
            submitted_at,
        }
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn approvers(&self) -> &ApproverQueue {
        &self.approvers
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Appends to the vote ledger. Ledger entries are never reordered or removed.
    pub fn record_vote(&mut self, user: impl Into<String>, decision: Decision) {
        self.votes.push(Vote {
            user: user.into(),
            decision,
            cast_at: TimeStamp::now(),
        });
    }

    pub fn record_comment(&mut self, text: impl Into<String>) {
        self.comments.push(text.into());
    }

    pub fn remove_approver(&mut self, username: &str) -> bool {
        self.approvers.remove(username)
    }

    pub fn mark_approved(&mut self) {
        self.status = ExpenseStatus::Approved;
    }

    /// Rejection cancels all outstanding approvals.
    pub fn mark_rejected(&mut self) {
        self.status = ExpenseStatus::Rejected;
        self.approvers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_rejects_duplicates() {
        let mut queue = ApproverQueue::new();
        assert!(queue.enqueue("bob"));
        assert!(queue.enqueue("carol"));
        assert!(!queue.enqueue("bob"));

        assert_eq!(queue.as_slice(), ["bob", "carol"]);
    }

    #[test]
    fn queue_remove_preserves_order() {
        let mut queue: ApproverQueue = ["bob", "carol", "dave"].into_iter().collect();

        assert!(queue.remove("carol"));
        assert!(!queue.remove("carol"));
        assert_eq!(queue.as_slice(), ["bob", "dave"]);
    }

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::now();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn expense_cbor_roundtrip() {
        let mut expense = Expense::new(
            "expense_1test".into(),
            "alice".into(),
            500,
            "USD".into(),
            "travel".into(),
            "client visit".into(),
            ["bob", "carol"].into_iter().collect(),
            TimeStamp::now(),
        );
        expense.record_comment("bob: Approved");
        expense.record_vote("bob", Decision::Approve);

        let encoded = minicbor::to_vec(&expense).unwrap();
        let decoded: Expense = minicbor::decode(&encoded).unwrap();

        assert_eq!(expense, decoded);
    }

    #[test]
    fn rejection_empties_queue() {
        let mut expense = Expense::new(
            "expense_1test".into(),
            "alice".into(),
            500,
            "USD".into(),
            "travel".into(),
            String::new(),
            ["bob", "carol"].into_iter().collect(),
            TimeStamp::now(),
        );

        expense.mark_rejected();

        assert_eq!(expense.status(), ExpenseStatus::Rejected);
        assert!(expense.approvers().is_empty());
        assert!(expense.is_terminal());
    }
}
