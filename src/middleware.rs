//! Access control and routing.
//!
//! Every inbound event passes through [`screen`] before any handler runs.
//! The stage is a pure function and cannot fail; the dispatch wrapper owns
//! logging and reply side effects, and converts handler faults into generic
//! notices so authorization internals are never exposed.

use crate::config::GroupPolicyConfig;
use crate::platform::InboundEvent;
use crate::store::Whitelist;

/// Handler an admitted event is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Start,
    Help,
    Settings,
    SetLanguage,
    Proofread,
    Voice,
    AddUser,
    RemoveUser,
    ListUsers,
    Debug,
    /// No handler is bound: unknown commands and plain text.
    None,
}

/// Why an event was dropped without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilentReason {
    NonCommandInGroup,
    DisallowedGroupCommand,
}

/// Admission decision for one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit(Route),
    /// Reject and tell the sender, using this catalog key.
    Notice(&'static str),
    /// Reject without any reply. Policy-driven sink, not an error.
    Silent(SilentReason),
}

/// Decide whether an event is processed at all, and by which handler.
///
/// Order matters: sender resolution, then whitelist, then group policy,
/// then dispatch. Admin commands are only routable while whitelist
/// enforcement is on; each admin handler re-checks admin identity itself.
pub fn screen(
    event: &InboundEvent,
    whitelist: &Whitelist,
    enforce: bool,
    policy: &GroupPolicyConfig,
) -> Admission {
    let Some(sender) = event.sender else {
        return Admission::Notice("not_authorized");
    };

    if enforce && !whitelist.is_authorized(sender) {
        return Admission::Notice("not_authorized");
    }

    if event.chat_kind.is_group() && policy.commands_only {
        match event.command_name() {
            None if policy.ignore_non_commands => {
                return Admission::Silent(SilentReason::NonCommandInGroup);
            }
            Some(name) if !policy.allowed_commands.iter().any(|c| c == name) => {
                return Admission::Silent(SilentReason::DisallowedGroupCommand);
            }
            _ => {}
        }
    }

    Admission::Admit(route_for(event, enforce))
}

fn route_for(event: &InboundEvent, whitelist_enabled: bool) -> Route {
    match event.command_name() {
        Some("start") => Route::Start,
        Some("help") => Route::Help,
        Some("settings") => Route::Settings,
        Some("language") => Route::SetLanguage,
        Some("proofread") => Route::Proofread,
        Some("adduser") if whitelist_enabled => Route::AddUser,
        Some("removeuser") if whitelist_enabled => Route::RemoveUser,
        Some("listusers") if whitelist_enabled => Route::ListUsers,
        Some("debug") if whitelist_enabled => Route::Debug,
        Some(_) => Route::None,
        None => match event.payload {
            crate::platform::EventPayload::Audio(_) => Route::Voice,
            _ => Route::None,
        },
    }
}
