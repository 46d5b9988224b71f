pub mod config;
pub mod output;
pub mod sumo;

pub use config::*;
pub use output::*;
pub use sumo::*;

#[cfg(test)]
mod tests {
    use super::{parse_server_config, PolicyTable, TimeoutPolicy};
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_core_types() {
        let _ = TypeId::of::<TimeoutPolicy>();
        let _ = TypeId::of::<PolicyTable>();
    }

    #[test]
    fn crate_root_reexports_parse_helpers() {
        let config = parse_server_config(
            r#"
[output]
dir = "output"
max_chars = 4000

[timeouts.rl_training]
base_timeout_secs = 0.2
max_timeout_secs = 0.2
"#,
        )
        .expect("parse server config");

        assert!(config.validate().is_empty());
        let table = config.policy_table();
        assert_eq!(table.policy_for("rl_training").base_timeout_secs, 0.2);
    }
}
