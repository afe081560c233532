use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{AppointmentStatus, CreateArgs, NewAppointment, PhoneArgs, RescheduleArgs, ToolRequest};
use crate::services::datetime::{parse_when, spoken};

const MIN_PHONE_DIGITS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Cancel,
    Reschedule,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Action::Cancel => "cancel",
            Action::Reschedule => "reschedule",
        }
    }
}

/// Every variant renders as the sentence the caller hears.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("I had trouble understanding that date and time. Could you repeat it?")]
    InvalidTime,

    #[error("That time has already passed. Could you pick a time in the future?")]
    PastTime,

    #[error("I'm sorry, that time is already booked. Please choose another time.")]
    Conflict,

    #[error("I didn't catch your phone number. Could you repeat it for me?")]
    MissingPhone,

    #[error("I couldn't find any active meetings to {} for this number.", .0.verb())]
    NotFound(Action),

    #[error("I'm sorry, something went wrong on my end. Please try again in a moment.")]
    Storage(anyhow::Error),
}

impl From<anyhow::Error> for BookingError {
    fn from(e: anyhow::Error) -> Self {
        BookingError::Storage(e)
    }
}

pub type BookingResult = Result<String, BookingError>;

/// Runs a validated tool request against the store and returns the reply text.
pub fn handle(conn: &Connection, request: &ToolRequest, now: NaiveDateTime) -> String {
    let result = match request {
        ToolRequest::Create(args) => create(conn, args, now),
        ToolRequest::Cancel(args) => cancel(conn, args),
        ToolRequest::List(args) => list(conn, args),
        ToolRequest::Reschedule(args) => reschedule(conn, args, now),
        ToolRequest::Unknown(name) => {
            tracing::warn!(tool = %name, "unrecognized tool call");
            return "Sorry, I can't help with that request.".to_string();
        }
    };
    reply(request.name(), result)
}

/// Flattens an operation result into the spoken reply, logging storage faults.
pub fn reply(tool: &str, result: BookingResult) -> String {
    match result {
        Ok(message) => message,
        Err(BookingError::Storage(e)) => {
            tracing::error!(tool, error = %e, "booking operation failed");
            BookingError::Storage(e).to_string()
        }
        Err(e) => {
            tracing::info!(tool, reason = %e, "booking request declined");
            e.to_string()
        }
    }
}

pub fn create(conn: &Connection, args: &CreateArgs, now: NaiveDateTime) -> BookingResult {
    let start_time = parse_future(args.start_time.as_deref(), now)?;

    if queries::find_scheduled_at(conn, &start_time)?.is_some() {
        return Err(BookingError::Conflict);
    }

    let phone = validate_phone(args.user_phone.as_deref())?;
    let user_name = clean(args.user_name.as_deref());
    let purpose = clean(args.purpose.as_deref());

    let appointment = queries::insert_appointment(
        conn,
        &NewAppointment {
            user_phone: phone.to_string(),
            user_name: user_name.to_string(),
            purpose: purpose.to_string(),
            start_time,
        },
    )?;

    tracing::info!(
        phone,
        appointment_id = appointment.id,
        start_time = %appointment.start_time,
        "appointment created"
    );

    let greeting = if user_name.is_empty() {
        String::new()
    } else {
        format!("{user_name}, ")
    };
    Ok(format!(
        "Meeting booked! {greeting}I've scheduled your {} for {}.",
        purpose_or_default(purpose),
        spoken(&appointment.start_time)
    ))
}

pub fn cancel(conn: &Connection, args: &PhoneArgs) -> BookingResult {
    let phone = validate_phone(args.user_phone.as_deref())?;

    let appointment = queries::find_scheduled_for_phone(conn, phone)?
        .ok_or(BookingError::NotFound(Action::Cancel))?;

    queries::update_status(conn, appointment.id, AppointmentStatus::Cancelled)?;
    tracing::info!(phone, appointment_id = appointment.id, "appointment cancelled");

    Ok("Your meeting has been cancelled successfully.".to_string())
}

pub fn list(conn: &Connection, args: &PhoneArgs) -> BookingResult {
    let phone = validate_phone(args.user_phone.as_deref())?;

    let appointments = queries::list_scheduled_for_phone(conn, phone)?;
    if appointments.is_empty() {
        return Ok("You have no upcoming meetings.".to_string());
    }

    let details = appointments
        .iter()
        .map(|a| format!("{} on {}", purpose_or_default(&a.purpose), spoken(&a.start_time)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("You have the following meetings scheduled: {details}."))
}

pub fn reschedule(conn: &Connection, args: &RescheduleArgs, now: NaiveDateTime) -> BookingResult {
    let phone = validate_phone(args.user_phone.as_deref())?;

    let appointment = queries::find_scheduled_for_phone(conn, phone)?
        .ok_or(BookingError::NotFound(Action::Reschedule))?;

    let new_time = parse_future(args.new_time.as_deref(), now)?;

    // moving onto its own slot is not a conflict
    if let Some(existing) = queries::find_scheduled_at(conn, &new_time)? {
        if existing.id != appointment.id {
            return Err(BookingError::Conflict);
        }
    }

    queries::update_start_time(conn, appointment.id, &new_time)?;
    tracing::info!(
        phone,
        appointment_id = appointment.id,
        from = %appointment.start_time,
        to = %new_time,
        "appointment rescheduled"
    );

    Ok(format!(
        "All set! Your {} has been moved to {}.",
        purpose_or_default(&appointment.purpose),
        spoken(&new_time)
    ))
}

fn parse_future(input: Option<&str>, now: NaiveDateTime) -> Result<NaiveDateTime, BookingError> {
    let parsed = input
        .and_then(|s| parse_when(s, now))
        .ok_or(BookingError::InvalidTime)?;
    if parsed <= now {
        return Err(BookingError::PastTime);
    }
    Ok(parsed)
}

fn validate_phone(phone: Option<&str>) -> Result<&str, BookingError> {
    let phone = clean(phone);
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digits < MIN_PHONE_DIGITS {
        return Err(BookingError::MissingPhone);
    }
    Ok(phone)
}

fn clean(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or_default()
}

fn purpose_or_default(purpose: &str) -> &str {
    if purpose.is_empty() {
        "appointment"
    } else {
        purpose
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    const PHONE: &str = "+15551234567";

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    // Friday, 16 October 2026, 10:00
    fn now() -> NaiveDateTime {
        dt("2026-10-16 10:00")
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn create_args(phone: &str, when: &str) -> CreateArgs {
        CreateArgs {
            user_phone: Some(phone.to_string()),
            user_name: Some("Sam".to_string()),
            purpose: Some("consult".to_string()),
            start_time: Some(when.to_string()),
        }
    }

    fn phone_args(phone: &str) -> PhoneArgs {
        PhoneArgs {
            user_phone: Some(phone.to_string()),
        }
    }

    fn reschedule_args(phone: &str, when: &str) -> RescheduleArgs {
        RescheduleArgs {
            user_phone: Some(phone.to_string()),
            new_time: Some(when.to_string()),
        }
    }

    #[test]
    fn test_create_books_next_tuesday() {
        let conn = setup_db();
        let reply = create(&conn, &create_args(PHONE, "next Tuesday 3pm"), now()).unwrap();

        assert!(reply.contains("Tuesday"), "{reply}");
        assert!(reply.contains("03:00 PM"), "{reply}");
        assert!(reply.starts_with("Meeting booked! Sam, I've scheduled your consult"));

        let stored = queries::find_scheduled_for_phone(&conn, PHONE).unwrap().unwrap();
        assert_eq!(stored.start_time, dt("2026-10-20 15:00"));
        assert_eq!(stored.status, AppointmentStatus::Scheduled);
        assert_eq!(stored.user_name, "Sam");
    }

    #[test]
    fn test_create_without_name_or_purpose() {
        let conn = setup_db();
        let args = CreateArgs {
            user_phone: Some(PHONE.to_string()),
            start_time: Some("tomorrow 9am".to_string()),
            ..Default::default()
        };
        let reply = create(&conn, &args, now()).unwrap();
        assert_eq!(
            reply,
            "Meeting booked! I've scheduled your appointment for Saturday, October 17 at 09:00 AM."
        );
    }

    #[test]
    fn test_create_conflict_does_not_persist() {
        let conn = setup_db();
        create(&conn, &create_args(PHONE, "2026-10-20 15:00"), now()).unwrap();

        let err = create(&conn, &create_args("+15559876543", "next tuesday at 3 pm"), now()).unwrap_err();
        assert!(matches!(err, BookingError::Conflict));
        assert!(err.to_string().contains("already booked"));
        assert_eq!(queries::count_scheduled_at(&conn, &dt("2026-10-20 15:00")).unwrap(), 1);
    }

    #[test]
    fn test_create_after_cancel_frees_slot() {
        let conn = setup_db();
        create(&conn, &create_args(PHONE, "2026-10-20 15:00"), now()).unwrap();
        cancel(&conn, &phone_args(PHONE)).unwrap();

        assert!(create(&conn, &create_args("+15559876543", "2026-10-20 15:00"), now()).is_ok());
    }

    #[test]
    fn test_create_rejects_bad_time() {
        let conn = setup_db();
        let err = create(&conn, &create_args(PHONE, "sometime soonish"), now()).unwrap_err();
        assert!(matches!(err, BookingError::InvalidTime));

        let args = CreateArgs {
            user_phone: Some(PHONE.to_string()),
            ..Default::default()
        };
        assert!(matches!(create(&conn, &args, now()), Err(BookingError::InvalidTime)));

        assert!(queries::list_scheduled_for_phone(&conn, PHONE).unwrap().is_empty());
    }

    #[test]
    fn test_create_rejects_past_time() {
        let conn = setup_db();
        let err = create(&conn, &create_args(PHONE, "2026-10-15 15:00"), now()).unwrap_err();
        assert!(matches!(err, BookingError::PastTime));
        assert!(queries::list_scheduled_for_phone(&conn, PHONE).unwrap().is_empty());
    }

    #[test]
    fn test_create_requires_phone_after_date_check() {
        let conn = setup_db();
        let err = create(&conn, &create_args("", "tomorrow 3pm"), now()).unwrap_err();
        assert!(matches!(err, BookingError::MissingPhone));

        let err = create(&conn, &create_args("555", "tomorrow 3pm"), now()).unwrap_err();
        assert!(matches!(err, BookingError::MissingPhone));

        // date is checked first
        let err = create(&conn, &create_args("", "gibberish"), now()).unwrap_err();
        assert!(matches!(err, BookingError::InvalidTime));
    }

    #[test]
    fn test_short_phone_rejected_for_every_tool() {
        let conn = setup_db();
        create(&conn, &create_args(PHONE, "2026-10-20 15:00"), now()).unwrap();

        for phone in ["", "  ", "55512", "call me"] {
            assert!(matches!(cancel(&conn, &phone_args(phone)), Err(BookingError::MissingPhone)));
            assert!(matches!(list(&conn, &phone_args(phone)), Err(BookingError::MissingPhone)));
            assert!(matches!(
                reschedule(&conn, &reschedule_args(phone, "2026-10-21 15:00"), now()),
                Err(BookingError::MissingPhone)
            ));
        }
        assert!(matches!(cancel(&conn, &PhoneArgs::default()), Err(BookingError::MissingPhone)));

        // the existing booking is untouched
        let stored = queries::find_scheduled_for_phone(&conn, PHONE).unwrap().unwrap();
        assert_eq!(stored.start_time, dt("2026-10-20 15:00"));
    }

    #[test]
    fn test_sub_second_inputs_share_a_slot() {
        let conn = setup_db();
        create(&conn, &create_args(PHONE, "2026-11-02T14:00:00.200Z"), now()).unwrap();

        let stored = queries::find_scheduled_for_phone(&conn, PHONE).unwrap().unwrap();
        assert_eq!(stored.start_time, parse_when("2026-11-02T14:00:00.200Z", now()).unwrap());
        assert_eq!(stored.start_time, dt("2026-11-02 14:00"));

        let err = create(&conn, &create_args("+15559876543", "2026-11-02T14:00:00.700Z"), now())
            .unwrap_err();
        assert!(matches!(err, BookingError::Conflict));
        assert_eq!(queries::count_scheduled_at(&conn, &dt("2026-11-02 14:00")).unwrap(), 1);
    }

    #[test]
    fn test_cancel_lifecycle() {
        let conn = setup_db();
        let err = cancel(&conn, &phone_args(PHONE)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "I couldn't find any active meetings to cancel for this number."
        );

        create(&conn, &create_args(PHONE, "tomorrow 3pm"), now()).unwrap();
        let id = queries::find_scheduled_for_phone(&conn, PHONE).unwrap().unwrap().id;

        assert_eq!(
            cancel(&conn, &phone_args(PHONE)).unwrap(),
            "Your meeting has been cancelled successfully."
        );
        let stored = queries::get_appointment(&conn, id).unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Cancelled);

        assert!(matches!(
            cancel(&conn, &phone_args(PHONE)),
            Err(BookingError::NotFound(Action::Cancel))
        ));
    }

    #[test]
    fn test_cancel_picks_earliest_of_several() {
        let conn = setup_db();
        create(&conn, &create_args(PHONE, "2026-10-22 09:00"), now()).unwrap();
        create(&conn, &create_args(PHONE, "2026-10-19 09:00"), now()).unwrap();

        cancel(&conn, &phone_args(PHONE)).unwrap();

        let remaining = queries::list_scheduled_for_phone(&conn, PHONE).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].start_time, dt("2026-10-22 09:00"));
    }

    #[test]
    fn test_list_empty_and_populated() {
        let conn = setup_db();
        assert_eq!(list(&conn, &phone_args(PHONE)).unwrap(), "You have no upcoming meetings.");

        create(&conn, &create_args(PHONE, "2026-10-20 15:00"), now()).unwrap();
        let args = CreateArgs {
            purpose: Some("checkup".to_string()),
            ..create_args(PHONE, "2026-10-21 09:30")
        };
        create(&conn, &args, now()).unwrap();

        assert_eq!(
            list(&conn, &phone_args(PHONE)).unwrap(),
            "You have the following meetings scheduled: consult on Tuesday, October 20 at 03:00 PM, \
             checkup on Wednesday, October 21 at 09:30 AM."
        );
    }

    #[test]
    fn test_list_ignores_other_phones_and_cancelled() {
        let conn = setup_db();
        create(&conn, &create_args("+15559876543", "2026-10-20 15:00"), now()).unwrap();
        create(&conn, &create_args(PHONE, "2026-10-21 15:00"), now()).unwrap();
        cancel(&conn, &phone_args(PHONE)).unwrap();

        assert_eq!(list(&conn, &phone_args(PHONE)).unwrap(), "You have no upcoming meetings.");
    }

    #[test]
    fn test_reschedule_moves_appointment() {
        let conn = setup_db();
        create(&conn, &create_args(PHONE, "2026-10-20 15:00"), now()).unwrap();

        let reply = reschedule(&conn, &reschedule_args(PHONE, "next friday 11am"), now()).unwrap();
        assert_eq!(
            reply,
            "All set! Your consult has been moved to Friday, October 23 at 11:00 AM."
        );

        let stored = queries::find_scheduled_for_phone(&conn, PHONE).unwrap().unwrap();
        assert_eq!(stored.start_time, dt("2026-10-23 11:00"));
    }

    #[test]
    fn test_reschedule_conflict_leaves_original() {
        let conn = setup_db();
        create(&conn, &create_args(PHONE, "2026-10-20 15:00"), now()).unwrap();
        create(&conn, &create_args("+15559876543", "2026-10-21 15:00"), now()).unwrap();

        let err = reschedule(&conn, &reschedule_args(PHONE, "2026-10-21 15:00"), now()).unwrap_err();
        assert!(matches!(err, BookingError::Conflict));

        let stored = queries::find_scheduled_for_phone(&conn, PHONE).unwrap().unwrap();
        assert_eq!(stored.start_time, dt("2026-10-20 15:00"));
    }

    #[test]
    fn test_reschedule_onto_own_slot() {
        let conn = setup_db();
        create(&conn, &create_args(PHONE, "2026-10-20 15:00"), now()).unwrap();
        assert!(reschedule(&conn, &reschedule_args(PHONE, "2026-10-20 15:00"), now()).is_ok());
    }

    #[test]
    fn test_reschedule_error_order() {
        let conn = setup_db();
        // lookup happens before parsing
        let err = reschedule(&conn, &reschedule_args(PHONE, "gibberish"), now()).unwrap_err();
        assert!(matches!(err, BookingError::NotFound(Action::Reschedule)));

        create(&conn, &create_args(PHONE, "2026-10-20 15:00"), now()).unwrap();
        let err = reschedule(&conn, &reschedule_args(PHONE, "gibberish"), now()).unwrap_err();
        assert!(matches!(err, BookingError::InvalidTime));

        let err = reschedule(&conn, &reschedule_args(PHONE, "2026-10-01 15:00"), now()).unwrap_err();
        assert!(matches!(err, BookingError::PastTime));
    }

    #[test]
    fn test_handle_unknown_tool() {
        let conn = setup_db();
        let reply = handle(&conn, &ToolRequest::Unknown("orderPizza".to_string()), now());
        assert_eq!(reply, "Sorry, I can't help with that request.");
    }

    #[test]
    fn test_storage_failure_becomes_apology() {
        let conn = setup_db();
        conn.execute_batch("DROP TABLE appointments;").unwrap();

        let reply = handle(&conn, &ToolRequest::List(phone_args(PHONE)), now());
        assert_eq!(
            reply,
            "I'm sorry, something went wrong on my end. Please try again in a moment."
        );
    }
}
