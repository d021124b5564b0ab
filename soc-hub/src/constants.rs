/// Number of channel endpoints bound to each peripheral.
pub const SOC_PERIPHERAL_CHANNEL_COUNT: usize = 3;

/// Index of the receive-DMA channel (device → hub) in a channel triplet.
pub const SOC_PERIPHERAL_FROM_DMA_CH: usize = 0;

/// Index of the transmit-DMA channel (hub → device) in a channel triplet.
pub const SOC_PERIPHERAL_TO_DMA_CH: usize = 1;

/// Index of the control channel in a channel triplet.
pub const SOC_PERIPHERAL_CONTROL_CH: usize = 2;

/// Status bit set when a receive transfer has landed in the receive ring.
pub const SOC_PERIPHERAL_ISR_DMA_RX_DONE_BM: u32 = 0x0000_0001;

/// Status bit set when a transmit slot has been handed to the device.
pub const SOC_PERIPHERAL_ISR_DMA_TX_DONE_BM: u32 = 0x0000_0002;

/// Size of the peripheral table. Fixed at build time.
///
/// Interrupt lines are one bit per peripheral, so this must not exceed 32.
pub const SOC_PERIPHERAL_COUNT: usize = 8;

/// Number of descriptors in each DMA ring.
pub const DMA_RING_SLOTS: usize = 4;

/// Bytes of storage behind each DMA descriptor.
pub const DMA_SLOT_BYTES: usize = 256;

/// Maximum payload of an out-of-band control request or reply.
pub const CONTROL_PAYLOAD_BYTES: usize = 32;

/// Upper bound on the number of logical cores a platform may expose.
pub const MAX_CORES: usize = 8;

const _: () = assert!(SOC_PERIPHERAL_COUNT <= 32, "one interrupt line per peripheral");
const _: () = assert!(DMA_RING_SLOTS >= 1, "rings need at least one slot");
