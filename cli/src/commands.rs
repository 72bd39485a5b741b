use std::future::Future;
use std::sync::Arc;

use anyhow::bail;
use todo_core::{
    ApiError, AuthState, CancellationToken, ClientConfig, CreateTodo, Destination, SessionManager,
    Todo, TodoClient, UpdateTodo,
};

use crate::Command;

pub async fn run(config: ClientConfig, command: Command) -> anyhow::Result<()> {
    let session = Arc::new(SessionManager::from_config(&config)?);
    let state = session.initialize().await;

    let scope = CancellationToken::new();
    {
        let scope = scope.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                scope.cancel();
            }
        });
    }
    let client = TodoClient::for_session(Arc::clone(&session), &config.api_base_url).scoped(scope.clone());

    match command {
        Command::Register {
            email,
            username,
            password,
        } => {
            let destination = cancellable(&scope, session.register(&email, &username, &password)).await?;
            announce(&session, destination);
        }
        Command::Login { email, password } => {
            let destination = cancellable(&scope, session.login(&email, &password)).await?;
            announce(&session, destination);
        }
        Command::Logout => {
            let destination = session.logout();
            announce(&session, destination);
        }
        Command::Whoami => {
            let user = require_user(&state)?;
            println!("{} <{}>", user.username, user.email);
        }
        Command::List { done } => {
            require_user(&state)?;
            let todos = if done {
                client.list_done().await?
            } else {
                client.list_all().await?
            };
            if todos.is_empty() {
                println!("No todos yet.");
            }
            for todo in &todos {
                print_todo(todo);
            }
        }
        Command::Add { title } => {
            require_user(&state)?;
            let title = title.trim();
            if title.is_empty() {
                bail!("title must not be empty");
            }
            print_todo(&client.create(&CreateTodo::new(title)).await?);
        }
        Command::Show { id } => {
            require_user(&state)?;
            print_todo(&client.get_by_id(id).await?);
        }
        Command::Rename { id, title } => {
            require_user(&state)?;
            print_todo(&client.update(id, &UpdateTodo::title(title.trim())).await?);
        }
        Command::Done { id } => {
            require_user(&state)?;
            print_todo(&client.toggle_done(id, true).await?);
        }
        Command::Undone { id } => {
            require_user(&state)?;
            print_todo(&client.toggle_done(id, false).await?);
        }
        Command::Delete { id } => {
            require_user(&state)?;
            client.delete(id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

/// Drive a session call until it completes or `scope` is cancelled. The
/// session only changes after its request has answered, so abandoning the
/// call leaves it as it was.
async fn cancellable<T>(
    scope: &CancellationToken,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    tokio::select! {
        biased;
        _ = scope.cancelled() => Err(ApiError::Cancelled),
        result = call => result,
    }
}

fn require_user(state: &AuthState) -> anyhow::Result<&todo_core::User> {
    match (&state.user, state.is_authenticated) {
        (Some(user), true) => Ok(user),
        _ => bail!("not logged in; run `todo login` first"),
    }
}

fn announce(session: &SessionManager, destination: Destination) {
    match (destination, session.auth_state().user) {
        (Destination::Home, Some(user)) => println!("Logged in as {} <{}>", user.username, user.email),
        (Destination::Home, None) => println!("Logged in"),
        (Destination::Landing, _) => println!("Logged out"),
    }
}

fn print_todo(todo: &Todo) {
    let mark = if todo.is_done { 'x' } else { ' ' };
    println!("[{mark}] {}  {}", todo.id, todo.title);
}
