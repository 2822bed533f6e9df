// Copyright (C) 2024 Laixer Equipment B.V.
// All rights reserved.
//
// This software may be modified and distributed under the terms
// of the included license.  See the LICENSE file for details.

use std::{sync::Arc, time::Duration};

use rover::{
    device::{MotorDriver, ObstructionSensor},
    Command, Robot,
};
use tokio::{
    io::{AsyncRead, AsyncWrite, BufReader},
    sync::Mutex,
};

use crate::{
    config::ServerConfig,
    form::{self, ControlForm},
    http::{HttpError, Method, Request, Response, Status},
};

/// Time allowed for a client to send its request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Web control application.
///
/// Single user, all clients share the same form feedback.
pub struct WebControl<M, S> {
    robot: Arc<Robot<M, S>>,
    form: Mutex<ControlForm>,
    stream_url: String,
}

impl<M, S> WebControl<M, S>
where
    M: MotorDriver + 'static,
    S: ObstructionSensor,
{
    pub fn new(robot: Arc<Robot<M, S>>, stream_url: String) -> Self {
        Self {
            robot,
            form: Mutex::new(ControlForm::default()),
            stream_url,
        }
    }

    /// Route a request to its handler.
    pub async fn handle(&self, request: &Request) -> Response {
        match (request.method, request.path.as_str()) {
            (Method::Get | Method::Head, "/") => {
                Response::html(Status::Ok, form::main_page(&self.stream_url))
            }
            (Method::Get | Method::Head, "/showRobotControlForm") => self.show_form(Status::Ok).await,
            (Method::Get | Method::Post, "/doRobotControl") => self.control(request).await,
            (_, "/" | "/showRobotControlForm" | "/doRobotControl") => {
                Response::text(Status::MethodNotAllowed, "Method not allowed")
            }
            (_, path) => Response::text(
                Status::NotFound,
                format!("The resource at {} could not be found", path),
            ),
        }
    }

    async fn show_form(&self, status: Status) -> Response {
        let state = self.robot.state().await;
        let form = self.form.lock().await;

        Response::html(status, form.render(&state))
    }

    async fn control(&self, request: &Request) -> Response {
        let action = request.param("action").unwrap_or_default();
        let speed = request.param("speed");

        log::debug!(
            "Control action [{}] speed [{}]",
            action,
            speed.as_deref().unwrap_or_default()
        );

        let command = match Command::parse(&action, speed.as_deref()) {
            Ok(command) => command,
            Err(e) => {
                log::warn!("Rejected control request: {}", e);

                self.form.lock().await.failed(&e);
                return self.show_form(Status::BadRequest).await;
            }
        };

        let mut form = self.form.lock().await;

        match self.robot.execute(command).await {
            Ok(state) => {
                form.executed(command, &state);
                Response::html(Status::Ok, form.render(&state))
            }
            Err(e) => {
                log::error!("Command {} failed: {}", command, e);

                form.failed(&e);
                drop(form);
                self.show_form(Status::InternalServerError).await
            }
        }
    }
}

async fn spawn_client_session<T, M, S>(
    stream: T,
    control: Arc<WebControl<M, S>>,
    _permit: tokio::sync::OwnedSemaphorePermit,
) where
    T: AsyncRead + AsyncWrite + Unpin,
    M: MotorDriver + 'static,
    S: ObstructionSensor,
{
    let mut stream = BufReader::new(stream);

    let response = match tokio::time::timeout(REQUEST_TIMEOUT, Request::read(&mut stream)).await {
        Ok(Ok(request)) => {
            log::trace!("{:?} {}", request.method, request.path);

            let include_body = request.method != Method::Head;
            (control.handle(&request).await, include_body)
        }
        Ok(Err(HttpError::Io(e))) => {
            log::debug!("Client connection failed: {}", e);
            return;
        }
        Ok(Err(e)) => {
            log::debug!("Invalid request: {}", e);
            (Response::text(Status::BadRequest, e.to_string()), true)
        }
        Err(_) => {
            log::debug!("Client request timeout");
            return;
        }
    };

    if let Err(e) = response.0.write(stream.get_mut(), response.1).await {
        log::debug!("Failed to write response: {}", e);
    }
}

/// Serve the web control until the listener fails.
pub(super) async fn http_listen<M, S>(
    config: ServerConfig,
    robot: Arc<Robot<M, S>>,
) -> anyhow::Result<()>
where
    M: MotorDriver + 'static,
    S: ObstructionSensor,
{
    use tokio::net::TcpListener;

    let max_connections = config.max_connections.max(1);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(max_connections));

    let control = Arc::new(WebControl::new(robot, config.stream_url.clone()));

    let listener = TcpListener::bind(&config.listen).await?;
    log::info!("Listening on: {}", config.listen);

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(connection) => connection,
            Err(e) => {
                log::warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        log::trace!("Accepted connection from: {}", addr);

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                log::warn!("Too many connections");
                continue;
            }
        };

        log::trace!(
            "Connections: {}/{}",
            max_connections - semaphore.available_permits(),
            max_connections
        );

        tokio::spawn(spawn_client_session(stream, control.clone(), permit));
    }
}

#[cfg(test)]
mod tests {
    use rover::{
        device::sim::{MotorCommand, SimMotorDriver, SimSensor},
        DriveConfig, RoverConfig,
    };

    use super::*;

    type SimControl = WebControl<SimMotorDriver, SimSensor>;

    fn control() -> (SimControl, SimMotorDriver) {
        let driver = SimMotorDriver::new();
        let robot = Robot::new(
            driver.clone(),
            SimSensor::new(),
            &DriveConfig::default(),
            &RoverConfig::default(),
        );

        let control = WebControl::new(Arc::new(robot), "http://camera/stream".to_owned());
        (control, driver)
    }

    async fn request(raw: &str) -> Request {
        let mut reader = BufReader::new(raw.as_bytes());
        Request::read(&mut reader).await.unwrap()
    }

    async fn post(control: &SimControl, body: &str) -> Response {
        let raw = format!(
            "POST /doRobotControl HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        control.handle(&request(&raw).await).await
    }

    #[tokio::test]
    async fn main_page() {
        let (control, _) = control();

        let response = control.handle(&request("GET / HTTP/1.1\r\n\r\n").await).await;
        assert_eq!(response.status, Status::Ok);
        assert!(response.body.contains("http://camera/stream"));
    }

    #[tokio::test]
    async fn show_form() {
        let (control, driver) = control();

        let response = control
            .handle(&request("GET /showRobotControlForm HTTP/1.1\r\n\r\n").await)
            .await;
        assert_eq!(response.status, Status::Ok);
        assert!(response.body.contains(form::ROVING_OFF));
        assert!(driver.commands().is_empty());
    }

    #[tokio::test]
    async fn not_found() {
        let (control, _) = control();

        let response = control
            .handle(&request("GET /favicon.ico HTTP/1.1\r\n\r\n").await)
            .await;
        assert_eq!(response.status, Status::NotFound);
    }

    #[tokio::test]
    async fn drive_forward() {
        let (control, driver) = control();

        let response = post(&control, "action=forward&speed=30").await;

        assert_eq!(response.status, Status::Ok);
        assert!(response.body.contains("Going forward"));
        assert!(response.body.contains(r#"id="forward" style="color: hotpink""#));
        assert_eq!(driver.commands(), vec![MotorCommand::SetSpeed(30)]);
    }

    #[tokio::test]
    async fn set_speed_from_query() {
        let (control, _) = control();

        let response = control
            .handle(&request("GET /doRobotControl?action=setSpeed&speed=90 HTTP/1.1\r\n\r\n").await)
            .await;

        assert_eq!(response.status, Status::Ok);
        assert!(response.body.contains("Setting speed to 90"));
        assert!(response.body.contains(r#"value="90""#));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_roving() {
        let (control, _) = control();

        let response = post(&control, "action=roving&speed=30").await;
        assert!(response.body.contains("Start roving"));
        assert!(response.body.contains(form::ROVING_ON));

        let response = post(&control, "action=roving&speed=30").await;
        assert!(response.body.contains("End roving"));
        assert!(response.body.contains(form::ROVING_OFF));
    }

    #[tokio::test]
    async fn unknown_action() {
        let (control, driver) = control();

        let response = post(&control, "action=jump&speed=30").await;

        assert_eq!(response.status, Status::BadRequest);
        assert!(response.body.contains("unknown command: jump"));
        assert!(driver.commands().is_empty());
    }

    #[tokio::test]
    async fn hardware_failure() {
        let (control, driver) = control();
        driver.set_failure(true);

        let response = post(&control, "action=backward&speed=30").await;

        assert_eq!(response.status, Status::InternalServerError);
        assert!(response.body.contains("Error: "));
    }

    #[tokio::test]
    async fn session_over_stream() {
        let (control, driver) = control();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(1));
        let permit = semaphore.clone().try_acquire_owned().unwrap();

        let (mut client, server) = tokio::io::duplex(16 * 1024);

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        client
            .write_all(b"GET /doRobotControl?action=stop HTTP/1.1\r\n\r\n")
            .await
            .unwrap();

        spawn_client_session(server, Arc::new(control), permit).await;

        let mut raw = String::new();
        client.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.contains("Stopping"));
        assert!(driver.commands().is_empty());
        assert_eq!(semaphore.available_permits(), 1);
    }
}
