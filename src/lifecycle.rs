use std::str::FromStr;

use crate::auth::Session;
use crate::error::GrievanceError;
use crate::models::{Grievance, Status};

/// Which status changes staff may make.
///
/// `Unrestricted` lets staff pick any status from any status, including
/// jumping straight from Pending to Resolved or reopening a resolved case.
/// `ForwardOnly` only permits moves along Pending -> In Progress -> Resolved
/// (skipping In Progress is allowed) plus same-status response edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    #[default]
    Unrestricted,
    ForwardOnly,
}

impl TransitionPolicy {
    pub fn allows(&self, from: Status, to: Status) -> bool {
        match self {
            TransitionPolicy::Unrestricted => true,
            TransitionPolicy::ForwardOnly => matches!(
                (from, to),
                (Status::Pending, _)
                    | (Status::InProgress, Status::InProgress | Status::Resolved)
                    | (Status::Resolved, Status::Resolved)
            ),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = GrievanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unrestricted" => Ok(TransitionPolicy::Unrestricted),
            "forward-only" | "forward_only" => Ok(TransitionPolicy::ForwardOnly),
            _ => Err(GrievanceError::UnknownValue {
                field: "transition policy",
                value: value.to_string(),
            }),
        }
    }
}

/// A staff decision on a case: the new status and the response text that
/// replaces whatever was there before.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: Status,
    pub response: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: Status, response: Option<String>) -> Self {
        let response = response.filter(|text| !text.trim().is_empty());
        Self { status, response }
    }
}

/// Checks that `session` may apply `update` to `grievance` under `policy`.
pub fn check_update(
    session: &Session,
    grievance: &Grievance,
    update: &StatusUpdate,
    policy: TransitionPolicy,
) -> Result<(), GrievanceError> {
    session.require_staff()?;

    if !policy.allows(grievance.status, update.status) {
        return Err(GrievanceError::InvalidTransition {
            from: grievance.status,
            to: update.status,
        });
    }

    Ok(())
}

/// Checks that `session` may leave `rating` on `grievance`.
pub fn check_rating(session: &Session, grievance: &Grievance, rating: i32) -> Result<(), GrievanceError> {
    if !(1..=5).contains(&rating) {
        return Err(GrievanceError::RatingOutOfRange(rating));
    }
    if grievance.submitter_id != Some(session.user_id) {
        return Err(GrievanceError::NotSubmitter);
    }
    if grievance.status != Status::Resolved {
        return Err(GrievanceError::NotResolved);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::{Category, Priority, Role, Sentiment};

    fn session(role: Role) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            username: "jordan".to_string(),
            role,
        }
    }

    fn grievance(submitter_id: Option<Uuid>, status: Status) -> Grievance {
        Grievance {
            id: Uuid::new_v4(),
            submitter_id,
            submitter_name: None,
            title: "Library closes early".to_string(),
            category: Category::Academic,
            description: "The library closes at 6pm during exams".to_string(),
            sentiment: Sentiment::Negative,
            priority: Priority::Medium,
            compound_score: -0.3,
            impact_score: 0.38,
            status,
            response: None,
            rating: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn staff_can_resolve_pending_case_directly() {
        let staff = session(Role::Staff);
        let case = grievance(None, Status::Pending);
        let update = StatusUpdate::new(Status::Resolved, Some("Hours extended".to_string()));

        assert!(check_update(&staff, &case, &update, TransitionPolicy::Unrestricted).is_ok());
        assert!(check_update(&staff, &case, &update, TransitionPolicy::ForwardOnly).is_ok());
    }

    #[test]
    fn unrestricted_policy_allows_reopening() {
        let admin = session(Role::Admin);
        let case = grievance(None, Status::Resolved);
        let update = StatusUpdate::new(Status::Pending, None);

        assert!(check_update(&admin, &case, &update, TransitionPolicy::Unrestricted).is_ok());
    }

    #[test]
    fn forward_only_policy_rejects_backward_moves() {
        let admin = session(Role::Admin);
        let case = grievance(None, Status::Resolved);
        let update = StatusUpdate::new(Status::InProgress, None);

        let err = check_update(&admin, &case, &update, TransitionPolicy::ForwardOnly).unwrap_err();
        assert!(matches!(
            err,
            GrievanceError::InvalidTransition {
                from: Status::Resolved,
                to: Status::InProgress
            }
        ));

        for from in Status::ALL {
            assert!(TransitionPolicy::ForwardOnly.allows(from, from));
        }
    }

    #[test]
    fn submitters_cannot_change_status() {
        let student = session(Role::Student);
        let case = grievance(Some(student.user_id), Status::Pending);
        let update = StatusUpdate::new(Status::Resolved, None);

        let err = check_update(&student, &case, &update, TransitionPolicy::Unrestricted).unwrap_err();
        assert!(matches!(err, GrievanceError::AccessDenied));
    }

    #[test]
    fn blank_response_clears_field() {
        let update = StatusUpdate::new(Status::InProgress, Some("  ".to_string()));
        assert_eq!(update.response, None);
    }

    #[test]
    fn rating_requires_submitter_and_resolution() {
        let student = session(Role::Student);
        let mut case = grievance(Some(student.user_id), Status::InProgress);

        assert!(matches!(check_rating(&student, &case, 4), Err(GrievanceError::NotResolved)));

        case.status = Status::Resolved;
        assert!(check_rating(&student, &case, 4).is_ok());
        assert!(matches!(check_rating(&student, &case, 6), Err(GrievanceError::RatingOutOfRange(6))));

        let other = session(Role::Student);
        assert!(matches!(check_rating(&other, &case, 5), Err(GrievanceError::NotSubmitter)));
    }

    #[test]
    fn anonymous_cases_cannot_be_rated() {
        let student = session(Role::Student);
        let case = grievance(None, Status::Resolved);
        assert!(matches!(check_rating(&student, &case, 3), Err(GrievanceError::NotSubmitter)));
    }

    #[test]
    fn policy_parses_from_config_values() {
        assert_eq!("forward-only".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::ForwardOnly);
        assert_eq!("Unrestricted".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Unrestricted);
        assert!("strict".parse::<TransitionPolicy>().is_err());
    }
}
