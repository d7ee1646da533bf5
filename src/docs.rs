use crate::api::attendance::{ScanDecision, StudentStatusResponse, ToggleRequest, ToggleResponse};
use crate::api::time_tracking::CheckInRequest;
use crate::model::absence::{AbsenceStatus, AbsenceType, AbsenceUpdate, NewAbsence, StaffAbsence};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, ToggleAction};
use crate::model::student::Student;
use crate::model::substitution::{GroupSubstitution, NewSubstitution, SubstitutionUpdate};
use crate::model::work_session::{
    BreakDurationUpdate, SessionEdit, SessionResponse, SessionStatus, SessionUpdate, WorkSession,
    WorkSessionBreak,
};
use crate::tracking::attendance::AttendanceStatusView;
use crate::tracking::reconciler::ReconcileReport;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

/// Registers the bearer and device-key schemes referenced by the paths.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "device_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                "X-Device-Key",
                "Device API key; X-Staff-Id and X-Staff-Pin are required alongside it",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "OGS API",
        version = "1.0.0",
        description = r#"
## Day-care presence and time tracking

Backend for an open all-day school (OGS).

### Key Features
- **Attendance**
  - RFID terminals check students in and out of their group
- **Time tracking**
  - Staff work sessions with breaks, edits and history
- **Substitutions**
  - Temporary group supervision without overlapping assignments
- **Absences**
  - Staff absence reporting with supervisor approval
- **Reconciliation**
  - Records left open past their day are closed at 23:59:59

### Security
Terminal endpoints use a device key plus the operator's staff id and PIN.
Everything else requires a **JWT Bearer** token.
"#,
    ),
    paths(
        crate::api::attendance::status,
        crate::api::attendance::toggle,
        crate::api::attendance::daily,

        crate::api::time_tracking::check_in,
        crate::api::time_tracking::check_out,
        crate::api::time_tracking::start_break,
        crate::api::time_tracking::end_break,
        crate::api::time_tracking::update_session,
        crate::api::time_tracking::edit_log,
        crate::api::time_tracking::history,
        crate::api::time_tracking::current,
        crate::api::time_tracking::presence_map,

        crate::api::substitution::list_substitutions,
        crate::api::substitution::create_substitution,
        crate::api::substitution::active_substitutions,
        crate::api::substitution::get_substitution,
        crate::api::substitution::update_substitution,
        crate::api::substitution::delete_substitution,

        crate::api::absence::list_absences,
        crate::api::absence::create_absence,
        crate::api::absence::update_absence,
        crate::api::absence::delete_absence,
        crate::api::absence::approve_absence,
        crate::api::absence::reject_absence,

        crate::api::admin::reconcile
    ),
    components(
        schemas(
            Student,
            AttendanceRecord,
            AttendanceStatus,
            AttendanceStatusView,
            ToggleAction,
            ScanDecision,
            ToggleRequest,
            ToggleResponse,
            StudentStatusResponse,
            SessionStatus,
            WorkSession,
            WorkSessionBreak,
            SessionResponse,
            SessionUpdate,
            BreakDurationUpdate,
            SessionEdit,
            CheckInRequest,
            GroupSubstitution,
            NewSubstitution,
            SubstitutionUpdate,
            AbsenceType,
            AbsenceStatus,
            StaffAbsence,
            NewAbsence,
            AbsenceUpdate,
            ReconcileReport
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Student attendance via RFID terminals"),
        (name = "Time tracking", description = "Staff work sessions and breaks"),
        (name = "Substitutions", description = "Group substitution management"),
        (name = "Absences", description = "Staff absence management"),
        (name = "Admin", description = "Maintenance operations"),
    )
)]
pub struct ApiDoc;
