mod events;
mod framing;
mod handshake;
mod ids;
mod requests;
mod subscriptions;

pub use events::Event;
pub use framing::{MAX_FRAME_BYTES, Message, OpCode, ProtocolError, decode_message, encode_message};
pub use handshake::{Hello, Identified, Identify, Reidentify};
pub use ids::RequestId;
pub use requests::{
    BatchRequest, BatchResult, ExecutionType, Request, RequestBatch, RequestBatchResponse,
    RequestResponse, RequestStatus, status_code,
};
pub use subscriptions::EventSubscription;
