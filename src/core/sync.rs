// Server sync - pulls files and databases from a configured context.
//
// Everything here only assembles pipelines; execution is delegated to the
// engine. A sync is: rsync (interactive), then per database a remote dump
// streamed to a local compressed file, then a local restore.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{Config, DatabaseMapping, MysqlCredentials, MysqldumpConfig, SyncContext};
use crate::engine::{ExecutionMode, Executor};
use crate::error::{Error, Result};
use crate::filter::TableFilter;
use crate::pipeline::{
    CombinedCommand, Command, CommandBuilder, ContainerCommand, Pipeline, RemoteCommand,
};
use crate::utils::io;

const DUMP_EXTENSION: &str = "sql.bz2";

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Render every pipeline without executing anything.
    pub dry_run: bool,
    /// Where dumps are written. A temporary directory is used when unset.
    pub dump_dir: Option<PathBuf>,
    /// rsync target directory.
    pub target_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStep {
    pub name: String,
    pub command: String,
    pub executed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub context: String,
    pub dry_run: bool,
    pub databases: Vec<DatabaseMapping>,
    pub steps: Vec<SyncStep>,
}

fn add_credentials<B: CommandBuilder>(command: &mut B, credentials: &MysqlCredentials) -> Result<()> {
    if let Some(username) = credentials.username.as_deref().filter(|v| !v.is_empty()) {
        command.add_argument_template("-u%s", username)?;
    }
    if let Some(password) = credentials.password.as_deref().filter(|v| !v.is_empty()) {
        command.add_argument_template("-p%s", password)?;
    }
    if let Some(hostname) = credentials.hostname.as_deref().filter(|v| !v.is_empty()) {
        command.add_argument_template("-h%s", hostname)?;
    }
    Ok(())
}

/// `mysql -B -N [credentials] [database]`
pub fn mysql_command(credentials: &MysqlCredentials, database: Option<&str>) -> Result<Command> {
    let mut command = Command::new("mysql");
    command
        // batch mode
        .add_argument_raw("-B")
        // skip column names
        .add_argument_raw("-N");
    add_credentials(&mut command, credentials)?;

    if let Some(database) = database {
        command.add_argument(database);
    }

    Ok(command)
}

/// `mysqldump [credentials] [options] [database] | bzip2 --compress --stdout`
pub fn mysqldump_command(
    credentials: &MysqlCredentials,
    dump: Option<&MysqldumpConfig>,
    database: Option<&str>,
) -> Result<Command> {
    let mut command = Command::new("mysqldump");
    add_credentials(&mut command, credentials)?;

    if let Some(option) = dump
        .and_then(|d| d.option.as_deref())
        .filter(|v| !v.trim().is_empty())
    {
        command.add_argument_raw(option);
    }

    // compressed transfer
    command.add_pipe_command(Command::with_raw("bzip2", "--compress --stdout"));

    if let Some(database) = database {
        command.add_argument(database);
    }

    Ok(command)
}

/// Wrap for the context's container and/or ssh host. Local contexts pass through.
pub fn wrap_for_context(ctx: &SyncContext, builder: impl Into<Pipeline>) -> Pipeline {
    let mut pipeline = builder.into();

    if let Some(container) = &ctx.container {
        pipeline = ContainerCommand::wrap(&container.name, pipeline)
            .with_runtime(&container.runtime)
            .into();
    }

    if let Some(ssh) = ctx.ssh.as_ref().filter(|s| !s.hostname.is_empty()) {
        let mut remote = RemoteCommand::wrap(&ssh.hostname, pipeline);
        if let Some(port) = ssh.port {
            remote = remote.with_port(port);
        }
        if let Some(identity_file) = ssh.identity_file.as_deref() {
            remote = remote
                .with_identity_file(crate::paths::expand(identity_file).to_string_lossy());
        }
        for option in &ssh.options {
            remote.add_ssh_option(option);
        }
        pipeline = remote.into();
    }

    pipeline
}

/// Split a dump into structure-only and data-only runs over one stream.
///
/// Both variants are clones of `dump` with their pipes cleared; the original
/// pipe chain (compression) moves onto the combined builder so it still runs
/// once over the concatenated output.
pub fn split_structure_and_data<S: AsRef<str>>(
    dump: &Command,
    ignored_tables: &[S],
) -> Result<CombinedCommand> {
    let mut structure = dump.clone();
    structure.add_argument_raw("--no-data").clear_pipes();

    let mut data = dump.clone();
    data.add_argument_raw("--no-create-info").clear_pipes();

    if !ignored_tables.is_empty() {
        data.add_argument_template_multiple("--ignore-table=%s", ignored_tables)?;
    }

    let pipes = dump.pipe_list();

    let mut combined = CombinedCommand::new();
    combined
        .add_command_for_combined_output(structure)
        .add_command_for_combined_output(data);

    if !pipes.is_empty() {
        combined.set_pipe_list(pipes);
    }

    Ok(combined)
}

/// `bzip2 -dc <dump> | mysql [credentials] <database>`
pub fn restore_command(
    credentials: &MysqlCredentials,
    database: &str,
    dump_file: &Path,
) -> Result<Command> {
    let mut mysql = Command::new("mysql");
    add_credentials(&mut mysql, credentials)?;
    mysql.add_argument(database);

    let mut command = Command::with_raw("bzip2", "-dc");
    command
        .add_argument(dump_file.to_string_lossy())
        .add_pipe_command(mysql);

    Ok(command)
}

/// rsync with optional top-level directory selection and exclude patterns.
///
/// Excludes are listed first so they also apply inside selected directories.
pub fn rsync_command<S: AsRef<str>>(
    source: &str,
    target: &Path,
    directories: &[S],
    excludes: &[S],
) -> Result<Command> {
    let mut command = Command::new("rsync");
    command
        .add_argument_raw("-rlptD")
        .add_argument_raw("--delete-after")
        .add_argument_raw("--progress")
        .add_argument_raw("--human-readable");

    if !excludes.is_empty() {
        command.add_argument_template_multiple("--exclude=%s", excludes)?;
    }

    if !directories.is_empty() {
        let includes: Vec<String> = directories
            .iter()
            .map(|dir| format!("/{}/***", dir.as_ref().trim_matches('/')))
            .collect();
        command
            .add_argument_template_multiple("--include=%s", &includes)?
            .add_argument_raw("--exclude='*'");
    }

    command
        .add_argument(source)
        .add_argument(target.to_string_lossy());

    Ok(command)
}

struct Runner<'a> {
    executor: &'a Executor,
    dry_run: bool,
    steps: Vec<SyncStep>,
}

impl Runner<'_> {
    fn step<B: CommandBuilder>(&mut self, name: &str, builder: &B) -> Result<()> {
        let command = builder.render();
        if !self.dry_run {
            self.executor.run(builder, ExecutionMode::Interactive)?;
        }
        self.steps.push(SyncStep {
            name: name.to_string(),
            command,
            executed: !self.dry_run,
        });
        Ok(())
    }
}

/// Run (or, with `dry_run`, plan) a full sync for one context.
pub fn run(
    config: &Config,
    ctx: &SyncContext,
    options: &SyncOptions,
    executor: &Executor,
) -> Result<SyncResult> {
    if ctx.rsync.is_none() && ctx.mysql.is_none() {
        return Err(Error::config_missing_key(
            format!("sync.{}.rsync|mysql", ctx.name),
            None,
        )
        .with_hint("Configure rsync and/or mysql for this context"));
    }

    let mut runner = Runner {
        executor,
        dry_run: options.dry_run,
        steps: Vec::new(),
    };

    if let Some(rsync) = &ctx.rsync {
        log_status!("sync", "Syncing files from {}", rsync.path);
        let command = rsync_command(
            &rsync.path,
            &options.target_dir,
            &rsync.directory,
            &rsync.exclude,
        )?;
        runner.step("rsync", &command)?;
    }

    let mut databases = Vec::new();

    if let Some(mysql) = &ctx.mysql {
        // Held until the restores are done.
        let temp_dir;
        let dump_dir = match &options.dump_dir {
            Some(dir) => {
                if !options.dry_run {
                    io::ensure_dir(dir, "create dump directory")?;
                }
                dir.clone()
            }
            None => {
                temp_dir = tempfile::Builder::new()
                    .prefix("opsbox-sync-")
                    .tempdir()
                    .map_err(|e| {
                        Error::internal_io(e.to_string(), Some("create temp dir".to_string()))
                    })?;
                temp_dir.path().to_path_buf()
            }
        };

        let filter = match mysql.filter.as_deref().filter(|f| !f.is_empty()) {
            Some(name) => {
                log_status!("sync", "Using filter \"{}\"", name);
                Some(TableFilter::new(config.filter(name)?)?)
            }
            None => None,
        };

        for mapping in mysql.databases() {
            let dump_file = dump_dir.join(format!("{}.{}", mapping.local, DUMP_EXTENSION));

            log_status!("sync", "Fetching foreign database \"{}\"", mapping.foreign);
            let dump = mysqldump_command(
                &mysql.credentials,
                ctx.mysqldump.as_ref(),
                Some(&mapping.foreign),
            )?;

            let dump: Pipeline = match &filter {
                Some(filter) => {
                    let ignored = if options.dry_run {
                        Vec::new()
                    } else {
                        let tables = list_tables(ctx, &mysql.credentials, &mapping.foreign, executor)?;
                        filter.ignored_tables(&tables, &mapping.foreign)
                    };
                    split_structure_and_data(&dump, &ignored)?.into()
                }
                None => dump.into(),
            };

            let mut command = wrap_for_context(ctx, dump);
            command.set_output_redirect_to_file(&dump_file);
            runner.step(&format!("dump:{}", mapping.foreign), &command)?;

            log_status!("sync", "Restoring database \"{}\"", mapping.local);
            let restore = restore_command(&config.local, &mapping.local, &dump_file)?;
            runner.step(&format!("restore:{}", mapping.local), &restore)?;

            databases.push(mapping);
        }
    }

    Ok(SyncResult {
        context: ctx.name.clone(),
        dry_run: options.dry_run,
        databases,
        steps: runner.steps,
    })
}

/// List tables of a foreign database through the context's wrapping.
pub fn list_tables(
    ctx: &SyncContext,
    credentials: &MysqlCredentials,
    database: &str,
    executor: &Executor,
) -> Result<Vec<String>> {
    let mut command = mysql_command(credentials, Some(database))?;
    command.add_argument_template("-e %s", "show tables;")?;

    let command = wrap_for_context(ctx, command);
    let execution = executor.run(&command, ExecutionMode::Captured)?;
    Ok(execution.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContainerConfig, SshConfig};

    fn credentials() -> MysqlCredentials {
        MysqlCredentials {
            username: Some("dump".to_string()),
            password: Some("p w".to_string()),
            hostname: None,
        }
    }

    #[test]
    fn mysql_command_adds_batch_flags_and_credentials() {
        let command = mysql_command(&credentials(), Some("shop")).unwrap();
        assert_eq!(command.render(), "mysql -B -N -udump -p'p w' shop");
    }

    #[test]
    fn mysqldump_command_pipes_through_bzip2() {
        let dump = MysqldumpConfig {
            option: Some("--single-transaction --quick".to_string()),
        };
        let command = mysqldump_command(&credentials(), Some(&dump), Some("shop")).unwrap();

        assert_eq!(
            command.render(),
            "mysqldump -udump -p'p w' --single-transaction --quick shop | bzip2 --compress --stdout"
        );
    }

    #[test]
    fn split_moves_compression_onto_combined_stream() {
        let dump = mysqldump_command(&MysqlCredentials::default(), None, Some("shop")).unwrap();
        let combined = split_structure_and_data(&dump, &["shop.cache_a", "shop.cache_b"]).unwrap();

        assert_eq!(
            combined.render(),
            "{ mysqldump shop --no-data && mysqldump shop --no-create-info \
             --ignore-table=shop.cache_a --ignore-table=shop.cache_b; } | bzip2 --compress --stdout"
        );
        // the base command is untouched
        assert_eq!(dump.render(), "mysqldump shop | bzip2 --compress --stdout");
    }

    #[test]
    fn split_without_ignored_tables() {
        let dump = mysqldump_command(&MysqlCredentials::default(), None, Some("shop")).unwrap();
        let combined = split_structure_and_data::<&str>(&dump, &[]).unwrap();

        assert_eq!(
            combined.render(),
            "{ mysqldump shop --no-data && mysqldump shop --no-create-info; } | bzip2 --compress --stdout"
        );
    }

    #[test]
    fn wrap_for_local_context_is_identity() {
        let ctx = SyncContext::default();
        let wrapped = wrap_for_context(&ctx, Command::new("mysql"));
        assert!(matches!(wrapped, Pipeline::Plain(_)));
    }

    #[test]
    fn wrap_for_context_nests_container_inside_ssh() {
        let ctx = SyncContext {
            ssh: Some(SshConfig {
                hostname: "deploy@prod".to_string(),
                port: Some(2222),
                identity_file: None,
                options: vec![],
            }),
            container: Some(ContainerConfig {
                name: "shop_db".to_string(),
                runtime: "docker".to_string(),
            }),
            ..SyncContext::default()
        };

        let wrapped = wrap_for_context(&ctx, Command::with_args("mysql", &["shop"]));
        assert_eq!(
            wrapped.render(),
            "ssh -o BatchMode=yes -p 2222 deploy@prod -- 'docker exec shop_db sh -c '\\''mysql shop'\\'''"
        );
    }

    #[test]
    fn restore_decompresses_into_mysql() {
        let command = restore_command(
            &MysqlCredentials::default(),
            "shop_local",
            Path::new("/tmp/x/shop_local.sql.bz2"),
        )
        .unwrap();

        assert_eq!(
            command.render(),
            "bzip2 -dc /tmp/x/shop_local.sql.bz2 | mysql shop_local"
        );
    }

    #[test]
    fn rsync_with_directories_and_excludes() {
        let command = rsync_command(
            "deploy@web:/var/www/shop/",
            Path::new("/srv/shop"),
            &["fileadmin".to_string(), "/uploads/".to_string()],
            &["*.log".to_string()],
        )
        .unwrap();

        assert_eq!(
            command.render(),
            "rsync -rlptD --delete-after --progress --human-readable --exclude='*.log' \
             --include='/fileadmin/***' --include='/uploads/***' --exclude='*' \
             deploy@web:/var/www/shop/ /srv/shop"
        );
    }
}
