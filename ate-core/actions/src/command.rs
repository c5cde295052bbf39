//! 命令动作
//!
//! 把配置的命令形式归一化为 `{name, args}` 描述并在服务环境内执行，
//! 输出经注入的收集器捕获后写入 `command/<id>`。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use ate_common::{Command, ExecContext, RunData};
use ate_service::{CollectorFactory, OutputCollector, Service, ServiceLocator};

use crate::action::{Action, Outcome};
use crate::config::{effective_timeout, CommandConfig, ExecuteConfig, OnFailure, When};
use crate::{ActionError, Result};

/// 把 shell/args 两种配置形式归一化为命令描述
///
/// shell 形式翻译为 `sh -c "<line>"`；args 形式首元素为可执行文件，
/// 空列表是配置错误。
pub(crate) fn resolve_command(
    shell: &Option<String>,
    args: &Option<Vec<String>>,
) -> Result<Command> {
    match (shell, args) {
        (Some(line), None) => Ok(Command::shell(line)),
        (None, Some(args)) => {
            let (name, rest) = args
                .split_first()
                .ok_or_else(|| ActionError::Config("参数形式的命令不能为空".to_string()))?;
            Ok(Command::new(name.clone(), rest.to_vec()))
        }
        (Some(_), Some(_)) => Err(ActionError::UnsupportedCommand(
            "shell 与 args 同时给出".to_string(),
        )),
        (None, None) => Err(ActionError::UnsupportedCommand(
            "缺少 shell 或 args".to_string(),
        )),
    }
}

/// 执行命令并把输出快照写入运行数据
async fn run_command(
    ctx: &ExecContext,
    data: &RunData,
    service: &Arc<dyn Service>,
    command: &Command,
    id: Option<&str>,
    collectors: &Arc<dyn CollectorFactory>,
) -> Result<bool> {
    let label = id.unwrap_or_else(|| service.name());
    let collector = collectors.make_collector(label);
    info!(service = service.name(), command = %command.name, "执行命令");
    service
        .exec_command(ctx, command, Arc::clone(&collector))
        .await?;
    if let Some(id) = id {
        data.store(&format!("command/{id}"), &collector.snapshot())
            .await?;
    }
    Ok(true)
}

/// 命令动作
pub struct CommandAction {
    id: Option<String>,
    service: Arc<dyn Service>,
    command: Command,
    collectors: Arc<dyn CollectorFactory>,
    timeout: Duration,
    when: When,
    on_failure: OnFailure,
}

impl CommandAction {
    pub fn new(
        config: &CommandConfig,
        locator: &dyn ServiceLocator,
        collectors: Arc<dyn CollectorFactory>,
        default_timeout: Duration,
    ) -> Result<Self> {
        let service = locator.find(&config.service)?;
        let command = resolve_command(&config.shell, &config.args)?;
        Ok(Self {
            id: config.id.clone(),
            service,
            command,
            collectors,
            timeout: effective_timeout(config.timeout, default_timeout),
            when: config.when,
            on_failure: config.on_failure,
        })
    }
}

#[async_trait]
impl Action for CommandAction {
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome {
        Outcome::from_result(
            run_command(
                ctx,
                data,
                &self.service,
                &self.command,
                self.id.as_deref(),
                &self.collectors,
            )
            .await,
        )
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }

    fn on_failure(&self) -> OnFailure {
        self.on_failure
    }
}

/// 执行动作
///
/// 与命令动作相同的命令形式；启用渲染时，命令名与每个参数在执行前
/// 先经服务的模板渲染器处理（以服务器解析后的参数为输入），任一
/// 字段渲染失败立即中止。
pub struct ExecuteAction {
    id: Option<String>,
    service: Arc<dyn Service>,
    command: Command,
    render: bool,
    collectors: Arc<dyn CollectorFactory>,
    timeout: Duration,
    when: When,
    on_failure: OnFailure,
}

impl ExecuteAction {
    pub fn new(
        config: &ExecuteConfig,
        locator: &dyn ServiceLocator,
        collectors: Arc<dyn CollectorFactory>,
        default_timeout: Duration,
    ) -> Result<Self> {
        let service = locator.find(&config.service)?;
        let command = resolve_command(&config.shell, &config.args)?;
        Ok(Self {
            id: config.id.clone(),
            service,
            command,
            render: config.render,
            collectors,
            timeout: effective_timeout(config.timeout, default_timeout),
            when: config.when,
            on_failure: config.on_failure,
        })
    }

    fn rendered_command(&self) -> Result<Command> {
        if !self.render {
            return Ok(self.command.clone());
        }
        let parameters = self.service.server_parameters();
        let name = self.service.render_template(&self.command.name, &parameters)?;
        let mut args = Vec::with_capacity(self.command.args.len());
        for arg in &self.command.args {
            args.push(self.service.render_template(arg, &parameters)?);
        }
        Ok(Command::new(name, args))
    }
}

#[async_trait]
impl Action for ExecuteAction {
    async fn execute(&self, ctx: &ExecContext, data: &RunData) -> Outcome {
        let command = match self.rendered_command() {
            Ok(command) => command,
            Err(err) => return Outcome::from_error(err),
        };
        Outcome::from_result(
            run_command(
                ctx,
                data,
                &self.service,
                &command,
                self.id.as_deref(),
                &self.collectors,
            )
            .await,
        )
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn when(&self) -> When {
        self.when
    }

    fn on_failure(&self) -> OnFailure {
        self.on_failure
    }
}
