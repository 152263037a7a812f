//! Scheduled event records.
//!
//! An [`EventRecord`] is one event proposed in a chat channel. Besides its
//! identity and timing it keeps track of who was invited, who is attending and
//! who is skipping. Those three lists always partition the known participants:
//! a user id shows up in at most one of them, and every transition moves the
//! id rather than copying it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Where a user currently stands for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Participation {
    Invited,
    Attending,
    Skipping,
}

/// A scheduled event and its participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    id: String,
    creator_id: String,
    /// Short event title.
    pub name: String,
    /// Free-form description, empty when none was given.
    #[serde(default)]
    pub description: String,
    start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime<Utc>>,
    /// Where notifications for this event are delivered.
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    invited: Vec<String>,
    #[serde(default)]
    attending: Vec<String>,
    #[serde(default)]
    skipping: Vec<String>,
}

impl EventRecord {
    /// Creates a new event. The creator starts out attending.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        start_time: DateTime<Utc>,
        creator_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        let creator_id = creator_id.into();
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            start_time,
            end_time: None,
            channel_id: channel_id.into(),
            invited: Vec::new(),
            attending: vec![creator_id.clone()],
            skipping: Vec::new(),
            creator_id,
        }
    }

    /// Builder: give the event a scheduled end.
    #[must_use]
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn creator_id(&self) -> &str {
        &self.creator_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn invited(&self) -> &[String] {
        &self.invited
    }

    pub fn attending(&self) -> &[String] {
        &self.attending
    }

    pub fn skipping(&self) -> &[String] {
        &self.skipping
    }

    /// Marks `user_id` as attending, taking it out of the other lists.
    pub fn add_attendee(&mut self, user_id: &str) {
        remove_from(&mut self.skipping, user_id);
        remove_from(&mut self.invited, user_id);
        add_to(&mut self.attending, user_id);
    }

    /// Marks `user_id` as skipping, taking it out of the other lists.
    pub fn add_skipper(&mut self, user_id: &str) {
        remove_from(&mut self.attending, user_id);
        remove_from(&mut self.invited, user_id);
        add_to(&mut self.skipping, user_id);
    }

    /// Invites `user_id` unless the event already knows about them.
    ///
    /// Returns `true` when the user was added, so callers only announce new
    /// invitations.
    pub fn add_invited_if_not_already(&mut self, user_id: &str) -> bool {
        if self.participation(user_id).is_some() {
            return false;
        }
        self.invited.push(user_id.to_string());
        true
    }

    /// Returns which list holds `user_id`, if any.
    pub fn participation(&self, user_id: &str) -> Option<Participation> {
        if contains(&self.attending, user_id) {
            Some(Participation::Attending)
        } else if contains(&self.skipping, user_id) {
            Some(Participation::Skipping)
        } else if contains(&self.invited, user_id) {
            Some(Participation::Invited)
        } else {
            None
        }
    }

    /// Time left before the event starts; negative once it has started.
    pub fn time_until_start(&self) -> Duration {
        self.time_until_start_at(Utc::now())
    }

    pub fn time_until_start_at(&self, now: DateTime<Utc>) -> Duration {
        self.start_time - now
    }

    /// Time left before the scheduled end, `None` for open-ended events.
    pub fn time_until_end(&self) -> Option<Duration> {
        self.time_until_end_at(Utc::now())
    }

    pub fn time_until_end_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.end_time.map(|end| end - now)
    }

    /// Returns true if the start time is at or before `now`.
    pub fn has_started_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }
}

fn contains(list: &[String], user_id: &str) -> bool {
    list.iter().any(|u| u == user_id)
}

fn add_to(list: &mut Vec<String>, user_id: &str) {
    if !contains(list, user_id) {
        list.push(user_id.to_string());
    }
}

fn remove_from(list: &mut Vec<String>, user_id: &str) {
    list.retain(|u| u != user_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn sample() -> EventRecord {
        EventRecord::new(
            "0",
            "Game Night",
            "bring snacks",
            utc(2026, 1, 2, 19, 30),
            "u1",
            "general",
        )
    }

    fn lists_holding(event: &EventRecord, user: &str) -> usize {
        [event.invited(), event.attending(), event.skipping()]
            .iter()
            .filter(|list| list.iter().any(|u| u == user))
            .count()
    }

    #[test]
    fn creator_attends_by_default() {
        let event = sample();
        assert_eq!(event.attending(), ["u1"]);
        assert!(event.invited().is_empty());
        assert!(event.skipping().is_empty());
        assert_eq!(event.end_time(), None);
    }

    #[test]
    fn attend_then_skip_scenario() {
        let mut event = sample();
        event.add_attendee("u2");
        event.add_skipper("u1");

        assert_eq!(event.attending(), ["u2"]);
        assert_eq!(event.skipping(), ["u1"]);
        assert!(event.invited().is_empty());
    }

    #[test]
    fn transitions_are_idempotent() {
        let mut event = sample();
        event.add_attendee("u2");
        event.add_attendee("u2");
        assert_eq!(event.attending(), ["u1", "u2"]);

        event.add_skipper("u2");
        event.add_skipper("u2");
        assert_eq!(event.attending(), ["u1"]);
        assert_eq!(event.skipping(), ["u2"]);
    }

    #[test]
    fn invite_only_unknown_users() {
        let mut event = sample();
        assert!(event.add_invited_if_not_already("u2"));
        let after_first = event.clone();
        assert!(!event.add_invited_if_not_already("u2"));
        assert_eq!(event, after_first);

        // creator is attending, so not invitable
        assert!(!event.add_invited_if_not_already("u1"));

        event.add_skipper("u3");
        assert!(!event.add_invited_if_not_already("u3"));
        assert_eq!(event.invited(), ["u2"]);
    }

    #[test]
    fn invited_user_moves_on_response() {
        let mut event = sample();
        event.add_invited_if_not_already("u2");
        event.add_attendee("u2");
        assert!(event.invited().is_empty());
        assert_eq!(event.participation("u2"), Some(Participation::Attending));

        event.add_invited_if_not_already("u3");
        event.add_skipper("u3");
        assert!(event.invited().is_empty());
        assert_eq!(event.participation("u3"), Some(Participation::Skipping));
    }

    #[test]
    fn membership_stays_a_partition() {
        // Walk every sequence of three transitions for a single user.
        type Step = fn(&mut EventRecord, &str);
        let steps: [Step; 3] = [
            |e, u| e.add_attendee(u),
            |e, u| e.add_skipper(u),
            |e, u| {
                e.add_invited_if_not_already(u);
            },
        ];

        for a in steps {
            for b in steps {
                for c in steps {
                    let mut event = sample();
                    assert_eq!(lists_holding(&event, "u9"), 0);
                    for step in [a, b, c] {
                        step(&mut event, "u9");
                        assert_eq!(lists_holding(&event, "u9"), 1);
                        assert_eq!(lists_holding(&event, "u1"), 1);
                    }
                }
            }
        }
    }

    #[test]
    fn unknown_user_has_no_participation() {
        assert_eq!(sample().participation("nobody"), None);
    }

    #[test]
    fn time_until_start_goes_negative() {
        let event = sample();
        let before = utc(2026, 1, 2, 19, 0);
        let after = utc(2026, 1, 2, 20, 0);

        assert_eq!(event.time_until_start_at(before), Duration::minutes(30));
        assert_eq!(event.time_until_start_at(after), Duration::minutes(-30));
        assert!(!event.has_started_at(before));
        assert!(event.has_started_at(after));
    }

    #[test]
    fn time_until_end_only_with_end_time() {
        let now = utc(2026, 1, 2, 19, 0);
        assert_eq!(sample().time_until_end_at(now), None);

        let event = sample().with_end_time(utc(2026, 1, 2, 21, 0));
        assert_eq!(event.time_until_end_at(now), Some(Duration::hours(2)));
    }

    #[test]
    fn snapshot_format() {
        let mut event = sample().with_end_time(utc(2026, 1, 2, 21, 30));
        event.add_invited_if_not_already("u2");
        event.add_skipper("u3");

        insta::assert_json_snapshot!(event, @r#"
        {
          "id": "0",
          "creator_id": "u1",
          "name": "Game Night",
          "description": "bring snacks",
          "start_time": "2026-01-02T19:30:00Z",
          "end_time": "2026-01-02T21:30:00Z",
          "channel_id": "general",
          "invited": [
            "u2"
          ],
          "attending": [
            "u1"
          ],
          "skipping": [
            "u3"
          ]
        }
        "#);
    }

    #[test]
    fn serde_keeps_the_same_instant() {
        let start = Utc
            .timestamp_opt(1_767_382_200, 123_456_789)
            .single()
            .unwrap();
        let event = EventRecord::new("4", "Standup", "", start, "u1", "c");

        let json = serde_json::to_string(&event).unwrap();
        let back: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.start_time(), start);
        assert_eq!(back, event);
    }

    #[test]
    fn older_records_without_invited_load() {
        let json = r#"{
            "id": "1",
            "creator_id": "u1",
            "name": "Raid",
            "description": "",
            "start_time": "2026-01-02T19:30:00.000Z",
            "attending": ["u1", "u2"],
            "skipping": []
        }"#;
        let event: EventRecord = serde_json::from_str(json).unwrap();
        assert!(event.invited().is_empty());
        assert_eq!(event.attending(), ["u1", "u2"]);
        assert_eq!(event.channel_id, "");
        assert_eq!(event.end_time(), None);
    }
}
