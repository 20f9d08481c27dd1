// Copyright: Metro Conquest organisers
// Game backend for the metro conquest event
// Removal of the attribution is not allowed

#![deny(
    clippy::mutable_key_type,
    clippy::map_entry,
    clippy::boxed_local,
    clippy::let_unit_value,
    clippy::redundant_allocation,
    clippy::bool_comparison,
    clippy::bind_instead_of_map,
    clippy::vec_box,
    clippy::while_let_loop,
    clippy::useless_asref,
    clippy::repeat_once,
    clippy::deref_addrof,
    clippy::suspicious_map,
    clippy::arc_with_non_send_sync,
    clippy::single_char_pattern,
    clippy::for_kv_map,
    clippy::let_and_return,
    clippy::iter_nth,
    clippy::iter_cloned_collect,
    clippy::bytes_nth,
    clippy::deprecated_clippy_cfg_attr,
    clippy::match_result_ok,
    clippy::cmp_owned,
    clippy::cmp_null,
    clippy::op_ref
)]

pub mod config;
pub mod feed;
pub mod game;
pub mod local_data;
pub mod metro;
pub mod models;
pub mod postgres_tools;
pub mod schema;
pub mod store;
pub mod team;

pub use config::GameConfig;
pub use game::GameCore;
pub use metro::{MetroSystem, Station};
pub use team::Team;
