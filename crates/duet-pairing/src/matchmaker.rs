//! FIFO matchmaking within each mode.

use duet_protocol::{ConnectionId, Mode, ServerEvent};
use duet_registry::{ConnectionRegistry, RegistryError};

use crate::channel::{deliver, Channel};

/// Pairs waiting connections.
///
/// Modes are visited in [`Mode::ALL`] order. Within a mode the two
/// longest-waiting connections are paired, repeatedly, until fewer than two
/// remain; an odd one out keeps waiting. Connections in different modes are
/// never paired because they never share a waiting list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matchmaker;

impl Matchmaker {
    /// Runs one matchmaking pass and sends `matched` to both sides of every
    /// new pair, earlier arrival first. Returns the pairs formed.
    ///
    /// # Errors
    /// Propagates a [`RegistryError`] if pairing breaks an invariant. Pairs
    /// formed before the failure stay formed.
    pub fn run(
        registry: &mut ConnectionRegistry,
        channel: &mut impl Channel,
    ) -> Result<Vec<(ConnectionId, ConnectionId)>, RegistryError> {
        let mut pairs = Vec::new();
        for mode in Mode::ALL {
            while let Some((first, second)) = registry.queue().front_pair(mode)
            {
                registry.set_partner(first, second)?;
                tracing::info!(%first, %second, %mode, "connections matched");

                deliver(channel, first, ServerEvent::Matched {
                    partner_id: second,
                });
                deliver(channel, second, ServerEvent::Matched {
                    partner_id: first,
                });
                pairs.push((first, second));
            }
        }
        Ok(pairs)
    }
}
