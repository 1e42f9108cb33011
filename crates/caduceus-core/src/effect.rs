//! Outbound effects and the closed effect vocabulary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

macro_rules! effect_types {
    ($($variant:ident => $tag:literal,)+) => {
        /// Kind of state change a protocol asks the host to apply.
        ///
        /// The set is compiled into the runtime; tags outside it are rejected
        /// at parse time.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[non_exhaustive]
        pub enum EffectType {
            $(
                #[doc = concat!("`", $tag, "`")]
                $variant,
            )+
        }

        impl EffectType {
            /// Every known effect type, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)+];

            /// The wire tag.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $tag,)+
                }
            }

            /// Look up an effect type by its wire tag.
            #[must_use]
            pub fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $($tag => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

effect_types! {
    AddBannerAlert => "ADD_BANNER_ALERT",
    AddClaimComment => "ADD_CLAIM_COMMENT",
    AddClaimLabel => "ADD_CLAIM_LABEL",
    AddOrUpdateProtocolCard => "ADD_OR_UPDATE_PROTOCOL_CARD",
    AppointmentFormProvidersPostSearchResults => "APPOINTMENT__FORM__PROVIDERS__POST_SEARCH_RESULTS",
    AssignDocumentReviewer => "ASSIGN_DOCUMENT_REVIEWER",
    AutocompleteSearchResults => "AUTOCOMPLETE_SEARCH_RESULTS",
    CalendarCreate => "CALENDAR__CREATE",
    CalendarEventCreate => "CALENDAR__EVENT__CREATE",
    CalendarEventDelete => "CALENDAR__EVENT__DELETE",
    CalendarEventUpdate => "CALENDAR__EVENT__UPDATE",
    CancelAppointment => "CANCEL_APPOINTMENT",
    CategorizeDocument => "CATEGORIZE_DOCUMENT",
    CheckInNote => "CHECK_IN_NOTE",
    CommandAvailableActionsResults => "COMMAND_AVAILABLE_ACTIONS_RESULTS",
    CommandValidationErrors => "COMMAND_VALIDATION_ERRORS",
    CommitPlanCommand => "COMMIT_PLAN_COMMAND",
    CreateAndSendMessage => "CREATE_AND_SEND_MESSAGE",
    CreateAppointment => "CREATE_APPOINTMENT",
    CreateCcda => "CREATE_CCDA",
    CreateCompoundMedication => "CREATE_COMPOUND_MEDICATION",
    CreateMessage => "CREATE_MESSAGE",
    CreateNote => "CREATE_NOTE",
    CreateScheduleEvent => "CREATE_SCHEDULE_EVENT",
    CreateTask => "CREATE_TASK",
    DeletePlanCommand => "DELETE_PLAN_COMMAND",
    DeleteScheduleEvent => "DELETE_SCHEDULE_EVENT",
    EditMessage => "EDIT_MESSAGE",
    EditPlanCommand => "EDIT_PLAN_COMMAND",
    EditPrescribeCommand => "EDIT_PRESCRIBE_COMMAND",
    EnterInErrorPlanCommand => "ENTER_IN_ERROR_PLAN_COMMAND",
    FreezeNote => "FREEZE_NOTE",
    LaunchModal => "LAUNCH_MODAL",
    LinkDocumentToPatient => "LINK_DOCUMENT_TO_PATIENT",
    LockNote => "LOCK_NOTE",
    Log => "LOG",
    MoveClaimToQueue => "MOVE_CLAIM_TO_QUEUE",
    NoShowNote => "NO_SHOW_NOTE",
    OriginateCommand => "ORIGINATE_COMMAND",
    OriginatePlanCommand => "ORIGINATE_PLAN_COMMAND",
    OriginatePrescribeCommand => "ORIGINATE_PRESCRIBE_COMMAND",
    PatientPortalAppointmentsFormLocationsPostSearchResults => "PATIENT_PORTAL__APPOINTMENTS__FORM_LOCATIONS__POST_SEARCH_RESULTS",
    PatientPortalAppointmentsFormProvidersPostSearchResults => "PATIENT_PORTAL__APPOINTMENTS__FORM_PROVIDERS__POST_SEARCH_RESULTS",
    PostClaimPayment => "POST_CLAIM_PAYMENT",
    PushNoteCharges => "PUSH_NOTE_CHARGES",
    RemoveClaimLabel => "REMOVE_CLAIM_LABEL",
    RemoveDocumentFromPatient => "REMOVE_DOCUMENT_FROM_PATIENT",
    RescheduleAppointment => "RESCHEDULE_APPOINTMENT",
    RevenuePaymentProcessorCreditCardTransaction => "REVENUE__PAYMENT_PROCESSOR__CREDIT_CARD_TRANSACTION",
    RevenuePaymentProcessorForm => "REVENUE__PAYMENT_PROCESSOR__FORM",
    RevenuePaymentProcessorMetadata => "REVENUE__PAYMENT_PROCESSOR__METADATA",
    RevenuePaymentProcessorPaymentMethod => "REVENUE__PAYMENT_PROCESSOR__PAYMENT_METHOD",
    RevenuePaymentProcessorPaymentMethodAddResponse => "REVENUE__PAYMENT_PROCESSOR__PAYMENT_METHOD__ADD_RESPONSE",
    RevenuePaymentProcessorPaymentMethodRemoveResponse => "REVENUE__PAYMENT_PROCESSOR__PAYMENT_METHOD__REMOVE_RESPONSE",
    SendMessage => "SEND_MESSAGE",
    SignNote => "SIGN_NOTE",
    SimpleApiResponse => "SIMPLE_API_RESPONSE",
    UnfreezeNote => "UNFREEZE_NOTE",
    UnlockNote => "UNLOCK_NOTE",
    UpdateAppointment => "UPDATE_APPOINTMENT",
    UpdateClaimLineItem => "UPDATE_CLAIM_LINE_ITEM",
    UpdateCompoundMedication => "UPDATE_COMPOUND_MEDICATION",
    UpdateDocumentFields => "UPDATE_DOCUMENT_FIELDS",
    UpdateNote => "UPDATE_NOTE",
    UpdateScheduleEvent => "UPDATE_SCHEDULE_EVENT",
    UpdateTask => "UPDATE_TASK",
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| CoreError::UnknownEffectType(s.to_string()))
    }
}

impl Serialize for EffectType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EffectType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A validated effect: a known type and an object payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Effect {
    /// What to do.
    #[serde(rename = "type", alias = "effect_type")]
    pub effect_type: EffectType,
    /// Effect-specific data, always a JSON object.
    pub payload: Value,
}

impl Effect {
    /// Create an effect. The payload is expected to be a JSON object.
    #[must_use]
    pub fn new(effect_type: EffectType, payload: Value) -> Self {
        Self {
            effect_type,
            payload,
        }
    }

    /// The raw wire form, as a protocol would return it.
    #[must_use]
    pub fn to_raw(&self) -> Value {
        serde_json::json!({
            "type": self.effect_type.as_str(),
            "payload": self.payload,
        })
    }
}
