pub mod stub;
pub mod tcp;
pub mod traits;

pub use stub::MatchEngineStub;
pub use tcp::{TcpChannel, TcpChannelFactory};
pub use traits::{ChannelFactory, ItemStream, RpcChannel};
