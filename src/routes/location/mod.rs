mod handler;
mod model;

pub use handler::{
    find_latest, group_locations, report_leader_location, report_member_location,
};
