use opsbox::config::Config;
use opsbox::sync::{self, SyncOptions};
use opsbox::Executor;
use std::path::PathBuf;

const CONFIG: &str = r#"{
    "sync": {
        "_": {
            "mysql": { "username": "dump", "filter": "shop" }
        },
        "production": {
            "ssh": { "hostname": "deploy@prod.example.com", "port": 2222 },
            "container": { "name": "db" },
            "mysql": { "password": "pa ss", "database": ["shop_local:shop"] },
            "rsync": {
                "path": "deploy@prod.example.com:/var/www/shop/",
                "directory": ["uploads"],
                "exclude": ["*.log"]
            }
        },
        "files-only": {
            "rsync": { "path": "/srv/shop/" },
            "mysql": null
        },
        "empty": {}
    },
    "mysqlBackupFilter": { "shop": ["/^cache_/"] },
    "local": { "username": "root" }
}"#;

fn options(dump_dir: &str) -> SyncOptions {
    SyncOptions {
        dry_run: true,
        dump_dir: Some(PathBuf::from(dump_dir)),
        target_dir: PathBuf::from("/var/www/local"),
    }
}

#[test]
fn dry_run_plans_every_step_without_executing() {
    let config = Config::parse(CONFIG, "test").unwrap();
    let ctx = config.context("production").unwrap();

    let result = sync::run(&config, &ctx, &options("/tmp/opsbox-dumps"), &Executor::new()).unwrap();

    assert!(result.dry_run);
    assert_eq!(result.context, "production");
    let names: Vec<&str> = result.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["rsync", "dump:shop", "restore:shop_local"]);
    assert!(result.steps.iter().all(|s| !s.executed));
}

#[test]
fn dump_step_is_wrapped_and_redirected() {
    let config = Config::parse(CONFIG, "test").unwrap();
    let ctx = config.context("production").unwrap();

    let result = sync::run(&config, &ctx, &options("/tmp/opsbox-dumps"), &Executor::new()).unwrap();
    let dump = &result.steps[1].command;

    assert!(dump.starts_with("ssh -o BatchMode=yes -p 2222 deploy@prod.example.com -- "));
    assert!(dump.contains("docker exec db sh -c "));
    assert!(dump.contains("--no-data"));
    assert!(dump.contains("--no-create-info"));
    assert!(dump.ends_with(" > '/tmp/opsbox-dumps/shop_local.sql.bz2'"));
}

#[test]
fn restore_step_uses_local_credentials() {
    let config = Config::parse(CONFIG, "test").unwrap();
    let ctx = config.context("production").unwrap();

    let result = sync::run(&config, &ctx, &options("/tmp/opsbox-dumps"), &Executor::new()).unwrap();

    assert_eq!(
        result.steps[2].command,
        "bzip2 -dc /tmp/opsbox-dumps/shop_local.sql.bz2 | mysql -uroot shop_local"
    );
}

#[test]
fn files_only_context_skips_databases() {
    let config = Config::parse(CONFIG, "test").unwrap();
    let ctx = config.context("files-only").unwrap();

    let result = sync::run(&config, &ctx, &options("/tmp/unused"), &Executor::new()).unwrap();

    assert!(result.databases.is_empty());
    assert_eq!(result.steps.len(), 1);
    assert!(result.steps[0].command.ends_with("/srv/shop/ /var/www/local"));
}

#[test]
fn context_without_work_is_rejected() {
    let config = Config::parse(CONFIG, "test").unwrap();
    let ctx = config.context("empty").unwrap();

    let ctx = opsbox::config::SyncContext { mysql: None, ..ctx };
    let err = sync::run(&config, &ctx, &options("/tmp/unused"), &Executor::new()).unwrap_err();
    assert_eq!(err.code.as_str(), "config.missing_key");
}
