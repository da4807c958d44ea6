//! One `RpcOperation` per remote call

mod add_user_to_group;
mod app_inst_list;
mod cloudlet_list;
mod find_cloudlet;
mod get_location;
mod qos_position_kpi;
mod register;
mod verify_location;

pub use add_user_to_group::AddUserToGroup;
pub use app_inst_list::GetAppInstList;
pub use cloudlet_list::GetCloudletList;
pub use find_cloudlet::{FindCloudlet, FindCloudletResponse};
pub use get_location::{GetLocation, GetLocationResponse};
pub use qos_position_kpi::QosPositionKpi;
pub use register::RegisterClient;
pub use verify_location::VerifyLocation;
