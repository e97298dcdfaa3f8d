mod handler;
mod model;

pub use handler::{
    create_group, deactivate_group, find_by_id, get_members, join_group, leave_group,
    update_radius,
};
pub use model::GroupInfo;
