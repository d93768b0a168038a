//! Protocol constants for USB-PTP and the Canon EOS vendor extension.
//!
//! Opcode/response/event values follow the PIMA 15740 standard; the
//! 0x9xxx opcodes and 0xD1xx property codes are Canon vendor extensions
//! documented by gphoto2.

// ============================================================================
// USB Identification
// ============================================================================

/// USB Still Image Capture class code.
pub const USB_CLASS_IMAGE: u8 = 6;
/// Still Image Capture subclass.
pub const USB_SUBCLASS_STILL_IMAGE: u8 = 1;
/// Picture Transfer Protocol.
pub const USB_PROTOCOL_PTP: u8 = 1;

// ============================================================================
// Standard Operations
// ============================================================================

pub const OP_GET_DEVICE_INFO: u16 = 0x1001;
pub const OP_OPEN_SESSION: u16 = 0x1002;
pub const OP_CLOSE_SESSION: u16 = 0x1003;
pub const OP_GET_OBJECT_INFO: u16 = 0x1008;
pub const OP_GET_OBJECT: u16 = 0x1009;
pub const OP_INITIATE_CAPTURE: u16 = 0x100E;
pub const OP_GET_DEVICE_PROP_DESC: u16 = 0x1014;
pub const OP_GET_DEVICE_PROP_VALUE: u16 = 0x1015;
pub const OP_SET_DEVICE_PROP_VALUE: u16 = 0x1016;

// ============================================================================
// Canon EOS Operations
// ============================================================================

/// EOS GetDeviceInfoEx.
pub const EOS_OP_GET_DEVICE_INFO: u16 = 0x9108;
/// EOS RemoteRelease (remote capture).
pub const EOS_OP_CAPTURE: u16 = 0x910F;
pub const EOS_OP_SET_DEVICE_PROP_VALUE: u16 = 0x9110;
pub const EOS_OP_SET_PC_CONNECT_MODE: u16 = 0x9114;
pub const EOS_OP_SET_EVENT_MODE: u16 = 0x9115;
pub const EOS_OP_GET_EVENT: u16 = 0x9116;
/// EOS GetViewFinderData (live view frame).
pub const EOS_OP_LIVE_VIEW: u16 = 0x9153;

/// Magic first parameter for GetViewFinderData, from gphoto2.
pub const EOS_LIVE_VIEW_PARAM: u32 = 0x0010_0000;

// ============================================================================
// Response Codes
// ============================================================================

pub const RSP_OK: u16 = 0x2001;
pub const RSP_DEVICE_PROP_NOT_SUPPORTED: u16 = 0x200A;
/// Canon: viewfinder frame not ready yet.
pub const RSP_OBJECT_NOT_READY: u16 = 0xA102;

// ============================================================================
// Events
// ============================================================================

pub const EVT_OBJECT_ADDED: u16 = 0x4002;

// ============================================================================
// Device Properties
// ============================================================================

pub const PROP_BATTERY_LEVEL: u16 = 0x5001;
pub const PROP_DEVICE_FRIENDLY_NAME: u16 = 0xD402;

/// EOS: where the viewfinder stream is routed (camera LCD vs. PC).
pub const EOS_PROP_EVF_OUTPUT_DEVICE: u16 = 0xD1B0;
/// EOS: where captured images land (card vs. host transfer).
pub const EOS_PROP_CAPTURE_DESTINATION: u16 = 0xD11C;

// ============================================================================
// Object Formats
// ============================================================================

pub const FMT_EXIF_JPEG: u16 = 0x3801;
