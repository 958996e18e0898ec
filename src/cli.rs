use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use watchtower_domain::WorkerOptions;

/// 构建命令行定义
pub fn build_cli() -> Command {
    Command::new("watchtower")
        .version(env!("CARGO_PKG_VERSION"))
        .about("队列Worker进程监管系统")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，未指定时使用配置文件中的值")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，未指定时使用配置文件中的值")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(
            Command::new("supervisor")
                .about("运行Supervisor调和循环")
                .arg(supervisor_arg()),
        )
        .subcommand(worker_command())
        .subcommand(
            Command::new("start")
                .about("启动一个Worker进程并输出其ID")
                .arg(Arg::new("queue").value_name("QUEUE").required(true))
                .arg(supervisor_arg()),
        )
        .subcommand(worker_id_command("stop", "停止Worker"))
        .subcommand(worker_id_command("pause", "暂停Worker"))
        .subcommand(worker_id_command("resume", "恢复Worker"))
        .subcommand(Command::new("list").about("列出所有Worker"))
        .subcommand(
            Command::new("cleanup")
                .about("清理心跳陈旧且进程已退出的Worker")
                .arg(
                    Arg::new("threshold")
                        .long("threshold")
                        .value_name("SECONDS")
                        .help("陈旧阈值（秒），默认使用配置值")
                        .value_parser(value_parser!(i64)),
                ),
        )
        .subcommand(
            Command::new("restart")
                .about("重启运行中的Worker")
                .arg(
                    Arg::new("queue")
                        .long("queue")
                        .value_name("QUEUE")
                        .help("只重启处理该队列的Worker"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("立即终止而不是等待当前任务结束")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("terminate").about("通知Supervisor停止全部Worker并退出"))
        .subcommand(
            Command::new("prune")
                .about("删除已停止的Worker记录")
                .arg(
                    Arg::new("older-than-hours")
                        .long("older-than-hours")
                        .value_name("HOURS")
                        .help("只删除最后心跳早于该小时数的记录")
                        .value_parser(value_parser!(i64))
                        .default_value("24"),
                ),
        )
}

fn supervisor_arg() -> Arg {
    Arg::new("supervisor")
        .long("supervisor")
        .value_name("NAME")
        .help("Supervisor名称")
        .default_value("default")
}

fn worker_id_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(Arg::new("id").value_name("ID").required(true))
}

fn worker_command() -> Command {
    Command::new("worker")
        .about("运行Worker运行时（通常由Supervisor启动）")
        .arg(
            Arg::new("queue")
                .value_name("QUEUE")
                .help("逗号分隔的队列名")
                .default_value("default"),
        )
        .arg(
            Arg::new("worker-id")
                .long("worker-id")
                .value_name("ID")
                .help("Worker ID，未指定时自动生成"),
        )
        .arg(supervisor_arg())
        .arg(Arg::new("connection").long("connection").value_name("NAME"))
        .arg(
            Arg::new("tries")
                .long("tries")
                .value_name("N")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("memory")
                .long("memory")
                .value_name("MB")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("sleep")
                .long("sleep")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("rest")
                .long("rest")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64)),
        )
}

/// 用命令行参数覆盖Worker选项
pub fn apply_worker_overrides(matches: &ArgMatches, mut options: WorkerOptions) -> WorkerOptions {
    if let Some(name) = matches.get_one::<String>("supervisor") {
        options.supervisor = name.clone();
    }
    if let Some(connection) = matches.get_one::<String>("connection") {
        options.connection = connection.clone();
    }
    if let Some(tries) = matches.get_one::<u32>("tries") {
        options.tries = *tries;
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        options.timeout = *timeout;
    }
    if let Some(memory) = matches.get_one::<u64>("memory") {
        options.memory = *memory;
    }
    if let Some(sleep) = matches.get_one::<u64>("sleep") {
        options.sleep = *sleep;
    }
    if let Some(rest) = matches.get_one::<u64>("rest") {
        options.rest = *rest;
    }
    options
}

/// 取出必填的字符串参数
pub fn required_str<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("缺少参数: {id}"))
}
