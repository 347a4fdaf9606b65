//! Messaging-channel integration: inbound webhook payload extraction and
//! the outbound gateway client behind the [`Notifier`] seam.

pub mod gateway;
pub mod inbound;
pub mod outbound;

pub use gateway::{GatewayClient, InstanceStatus};
pub use inbound::{parse_inbound, IgnoreReason, InboundEvent, InboundMessage};
pub use outbound::{ChoiceList, ChoiceRow, ChoiceSection, NoopNotifier, Notifier, NotifyError};
