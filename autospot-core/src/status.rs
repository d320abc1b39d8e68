//! Appointment status grouping for the list tabs and the detail timeline.

use crate::models::{Appointment, AppointmentStatus};
use serde::{Deserialize, Serialize};

// ── Buckets ────────────────────────────────────────────────────────────

/// The three tabs of the appointment list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    #[default]
    Upcoming,
    Completed,
    Cancelled,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Upcoming, Bucket::Completed, Bucket::Cancelled];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Upcoming => "programadas",
            Bucket::Completed => "realizadas",
            Bucket::Cancelled => "canceladas",
        }
    }

    /// Accepts the enum name or the tab label.
    pub fn parse(raw: &str) -> Option<Bucket> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "upcoming" | "programadas" => Some(Bucket::Upcoming),
            "completed" | "realizadas" => Some(Bucket::Completed),
            "cancelled" | "canceladas" => Some(Bucket::Cancelled),
            _ => None,
        }
    }
}

/// Progress of an appointment as shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Booked,
    Confirmed,
    Delivered,
    Cancelled,
}

impl AppointmentStatus {
    pub fn bucket(self) -> Bucket {
        match self {
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed => Bucket::Upcoming,
            AppointmentStatus::Completed => Bucket::Completed,
            AppointmentStatus::Cancelled => Bucket::Cancelled,
        }
    }

    pub fn stage(self) -> Stage {
        match self {
            AppointmentStatus::Scheduled => Stage::Booked,
            AppointmentStatus::Confirmed => Stage::Confirmed,
            AppointmentStatus::Completed => Stage::Delivered,
            AppointmentStatus::Cancelled => Stage::Cancelled,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Buckets {
    pub upcoming: Vec<Appointment>,
    pub completed: Vec<Appointment>,
    pub cancelled: Vec<Appointment>,
}

impl Buckets {
    pub fn get(&self, bucket: Bucket) -> &[Appointment] {
        match bucket {
            Bucket::Upcoming => &self.upcoming,
            Bucket::Completed => &self.completed,
            Bucket::Cancelled => &self.cancelled,
        }
    }

    pub fn into_bucket(self, bucket: Bucket) -> Vec<Appointment> {
        match bucket {
            Bucket::Upcoming => self.upcoming,
            Bucket::Completed => self.completed,
            Bucket::Cancelled => self.cancelled,
        }
    }

    pub fn len(&self) -> usize {
        self.upcoming.len() + self.completed.len() + self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits a fetched list into its buckets, keeping the input order inside
/// each one.
pub fn partition(appointments: Vec<Appointment>) -> Buckets {
    let mut buckets = Buckets::default();
    for appointment in appointments {
        match appointment.status.bucket() {
            Bucket::Upcoming => buckets.upcoming.push(appointment),
            Bucket::Completed => buckets.completed.push(appointment),
            Bucket::Cancelled => buckets.cancelled.push(appointment),
        }
    }
    buckets
}

// ── Timeline ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub booked: bool,
    pub confirmed: bool,
    pub at_shop: bool,
    pub delivered: bool,
}

impl Timeline {
    pub fn for_status(status: AppointmentStatus) -> Timeline {
        let stage = status.stage();
        let delivered = stage == Stage::Delivered;
        Timeline {
            booked: stage != Stage::Cancelled,
            confirmed: matches!(stage, Stage::Confirmed | Stage::Delivered),
            at_shop: delivered,
            delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn appointment(id: &str, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: id.into(),
            client_id: "c1".into(),
            vehicle_id: "v1".into(),
            service_id: None,
            scheduled_at: Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
            status,
            notes: None,
            created_at: None,
            vehicle: None,
            service: None,
        }
    }

    #[test]
    fn bucket_mapping() {
        assert_eq!(AppointmentStatus::Scheduled.bucket(), Bucket::Upcoming);
        assert_eq!(AppointmentStatus::Confirmed.bucket(), Bucket::Upcoming);
        assert_eq!(AppointmentStatus::Completed.bucket(), Bucket::Completed);
        assert_eq!(AppointmentStatus::Cancelled.bucket(), Bucket::Cancelled);
    }

    #[test]
    fn partition_keeps_order_within_buckets() {
        let buckets = partition(vec![
            appointment("a", AppointmentStatus::Confirmed),
            appointment("b", AppointmentStatus::Cancelled),
            appointment("c", AppointmentStatus::Scheduled),
            appointment("d", AppointmentStatus::Completed),
        ]);
        let ids = |b: Bucket| -> Vec<String> {
            buckets.get(b).iter().map(|a| a.id.clone()).collect()
        };
        assert_eq!(ids(Bucket::Upcoming), vec!["a", "c"]);
        assert_eq!(ids(Bucket::Completed), vec!["d"]);
        assert_eq!(ids(Bucket::Cancelled), vec!["b"]);
        assert_eq!(buckets.len(), 4);
    }

    #[test]
    fn labels_parse_back() {
        for bucket in Bucket::ALL {
            assert_eq!(Bucket::parse(bucket.label()), Some(bucket));
        }
        assert_eq!(Bucket::parse("Upcoming"), Some(Bucket::Upcoming));
        assert_eq!(Bucket::parse("pending"), None);
    }

    #[test]
    fn timeline_checkpoints() {
        let scheduled = Timeline::for_status(AppointmentStatus::Scheduled);
        assert!(scheduled.booked && !scheduled.confirmed && !scheduled.at_shop);

        let confirmed = Timeline::for_status(AppointmentStatus::Confirmed);
        assert!(confirmed.booked && confirmed.confirmed && !confirmed.delivered);

        let completed = Timeline::for_status(AppointmentStatus::Completed);
        assert!(completed.booked && completed.confirmed && completed.at_shop && completed.delivered);

        let cancelled = Timeline::for_status(AppointmentStatus::Cancelled);
        assert_eq!(
            cancelled,
            Timeline {
                booked: false,
                confirmed: false,
                at_shop: false,
                delivered: false
            }
        );
    }
}
