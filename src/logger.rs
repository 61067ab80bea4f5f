/// This target is used exclusively to handle group events.
pub const GROUP_TARGET: &str = "profsup::group";

/// Target on which forwarded child output is mirrored.
pub const CHILD_OUTPUT_TARGET: &str = "profsup::child";

#[macro_export]
/// Start a new log group. All logs between this and the next `end_group!` will be grouped together.
///
/// # Example
///
/// ```rust
/// use profile_supervisor::{end_group, start_group};
///
/// start_group!("Profiling report");
/// log::info!("This will be grouped");
/// end_group!();
/// ```
macro_rules! start_group {
    ($name:expr) => {
        log::log!(target: $crate::logger::GROUP_TARGET, log::Level::Info, "{}", $name);
    };
}

#[macro_export]
/// End the current log group.
/// See [`start_group!`] for more information.
macro_rules! end_group {
    () => {
        log::log!(target: $crate::logger::GROUP_TARGET, log::Level::Info, "");
    };
}

#[derive(Debug, PartialEq)]
pub enum GroupEvent {
    Start(String),
    End,
}

/// Returns the group event if the record is a group event, otherwise returns `None`.
pub(crate) fn get_group_event(record: &log::Record) -> Option<GroupEvent> {
    if record.target() != GROUP_TARGET {
        return None;
    }

    let args = record.args().to_string();
    if args.is_empty() {
        Some(GroupEvent::End)
    } else {
        Some(GroupEvent::Start(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_event_for(target: &str, message: &str) -> Option<GroupEvent> {
        get_group_event(
            &log::Record::builder()
                .target(target)
                .level(log::Level::Info)
                .args(format_args!("{message}"))
                .build(),
        )
    }

    #[test]
    fn test_group_start_carries_the_name() {
        assert_eq!(
            group_event_for(GROUP_TARGET, "Profiling report"),
            Some(GroupEvent::Start("Profiling report".to_string()))
        );
    }

    #[test]
    fn test_empty_group_message_ends_the_group() {
        assert_eq!(group_event_for(GROUP_TARGET, ""), Some(GroupEvent::End));
    }

    #[test]
    fn test_other_targets_are_not_group_events() {
        assert_eq!(group_event_for("profsup::session", "hello"), None);
    }
}
