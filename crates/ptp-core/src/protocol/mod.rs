//! Protocol module - PTP wire definitions.

pub mod container;
pub mod format;
pub mod values;

pub use container::{
    CONTAINER_HEADER_SIZE, ContainerError, ContainerHeader, ContainerType, Event, Request,
    Response, decode_event, decode_response, encode_data,
};
pub use format::{SimpleForm, Value, lookup_data_type};
pub use values::*;
