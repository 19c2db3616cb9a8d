// homematic-rpc: HomeMatic XML-RPC wire protocol (client, callback server, script client)

pub mod client;
pub mod envelope;
pub mod error;
pub mod script;
pub mod server;
pub mod transport;
pub mod value;

mod xml;

pub use client::{HttpRpcClient, RpcClient};
pub use envelope::{Fault, Request, Response};
pub use error::Error;
pub use script::{NameLookup, ScriptClient, ScriptResult};
pub use server::{CallbackServer, Handler};
pub use transport::TransportConfig;
pub use value::Value;
