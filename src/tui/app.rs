//! TUI application state and main event loop
//!
//! All visible state lives on this single task; the change feed, the
//! auth-state watch, the remote-config fetch, and terminal input each
//! deliver into the same select loop.

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::compose::ComposeState;
use super::messages::MessagesState;
use super::ui;
use crate::api::client::ChatClient;
use crate::api::remote_config::{self, DEFAULT_MSG_LENGTH_LIMIT};
use crate::api::{messages as api_messages, storage};
use crate::auth::{AuthState, AuthWatcher, TokenStore};
use crate::config::Config;
use crate::stream::{feed_channel, ChildEvent, FeedItem, StreamError, Subscription};

/// Active pane in the TUI
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Messages,
    #[default]
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }
}

/// Application state
pub struct App {
    /// Whether the app should exit
    pub should_exit: bool,
    /// Session state, driven by the auth-state subscription
    pub session: AuthState,
    /// Paused: feed detached and list discarded until resume
    pub paused: bool,
    /// Whether the change feed is currently attached
    pub feed_attached: bool,
    /// Active pane
    pub active_pane: Pane,
    /// Messages pane state
    pub messages: MessagesState,
    /// Compose box state
    pub compose: ComposeState,
    /// Photo path entry overlay, when active
    pub photo_prompt: Option<String>,
    /// Transient status-bar message
    pub status_message: Option<String>,
    pub status_is_error: bool,
}

impl App {
    pub fn new(session: AuthState) -> Self {
        Self {
            should_exit: false,
            session,
            paused: false,
            feed_attached: false,
            active_pane: Pane::default(),
            messages: MessagesState::new(),
            compose: ComposeState::default(),
            photo_prompt: None,
            status_message: None,
            status_is_error: false,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self.session {
            AuthState::SignedIn { ref username } => Some(username),
            AuthState::SignedOut => None,
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status_message = Some(message.into());
        self.status_is_error = is_error;
    }

    pub fn on_signed_in(&mut self, username: String) {
        self.session = AuthState::SignedIn { username };
    }

    /// Sign-out cleanup: the visible list empties; the caller drops the
    /// subscription handle.
    pub fn on_signed_out(&mut self) {
        self.session = AuthState::SignedOut;
        self.messages.clear();
        self.feed_attached = false;
    }

    /// Apply one change-feed event to the visible list. Removals and moves
    /// are acknowledged but have no visible effect.
    pub fn handle_child_event(&mut self, event: ChildEvent) {
        if !self.session.is_signed_in() {
            return;
        }
        match event {
            ChildEvent::Added { key, message } => self.messages.upsert(key, &message),
            ChildEvent::Changed { key, message } => self.messages.upsert(key, &message),
            ChildEvent::Removed { .. } => {}
            ChildEvent::Moved { .. } => {}
        }
    }

    /// Render the UI
    pub fn render(&self, frame: &mut ratatui::Frame) {
        ui::render(frame, self);
    }
}

/// Run the TUI application.
pub async fn run() -> Result<()> {
    let client = Arc::new(ChatClient::new().await?);
    let watcher = AuthWatcher::from_config(client.config());

    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, client, &watcher).await;
    ratatui::restore();

    if !watcher.current().is_signed_in() {
        println!("Signed out. Run 'friendly-cli login' to sign back in.");
    }
    result
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    client: Arc<ChatClient>,
    watcher: &AuthWatcher,
) -> Result<()> {
    let mut app = App::new(watcher.current());
    let mut auth_rx = watcher.subscribe();

    // Feed events flow through a channel owned here so the subscription
    // handle can be dropped from any branch below.
    let (feed_tx, mut feed_rx) = feed_channel();
    let mut subscription: Option<Subscription> = None;

    // The default length limit applies immediately; the fetched value (if
    // any) overrides it once the fetch completes.
    let (limit_tx, mut limit_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let limit = remote_config::limit_after_fetch(
            remote_config::fetch_msg_length_limit().await,
            DEFAULT_MSG_LENGTH_LIMIT,
        );
        let _ = limit_tx.send(limit).await;
    });

    if app.session.is_signed_in() {
        attach_feed(&client, &feed_tx, &mut subscription, &mut app).await;
    }

    let mut input = EventStream::new();

    while !app.should_exit {
        terminal.draw(|frame| app.render(frame))?;

        tokio::select! {
            maybe_event = input.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        handle_key(
                            &mut app,
                            key,
                            &client,
                            watcher,
                            &feed_tx,
                            &mut subscription,
                        )
                        .await;
                    }
                    Some(Ok(_)) => {
                        // Resize etc. handled on next draw
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }
            item = feed_rx.recv(), if subscription.is_some() => {
                handle_feed_item(&mut app, item, watcher, &mut subscription);
            }
            changed = auth_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = auth_rx.borrow_and_update().clone();
                match state {
                    AuthState::SignedIn { username } => {
                        app.set_status(format!("Signed in as {}", username), false);
                        app.on_signed_in(username);
                        if !app.paused {
                            attach_feed(&client, &feed_tx, &mut subscription, &mut app).await;
                        }
                    }
                    AuthState::SignedOut => {
                        if let Some(sub) = subscription.take() {
                            sub.detach();
                        }
                        app.on_signed_out();
                        // Back to the sign-in flow.
                        app.should_exit = true;
                    }
                }
            }
            Some(limit) = limit_rx.recv() => {
                app.compose.set_max_len(limit);
            }
        }
    }

    Ok(())
}

/// Attach the change feed. Idempotent: an existing subscription is kept.
async fn attach_feed(
    client: &ChatClient,
    feed_tx: &mpsc::Sender<FeedItem>,
    subscription: &mut Option<Subscription>,
    app: &mut App,
) {
    if subscription.is_some() {
        return;
    }
    match Subscription::attach(client, feed_tx.clone()).await {
        Ok(sub) => {
            *subscription = Some(sub);
            app.feed_attached = true;
        }
        Err(e) => {
            tracing::warn!("Failed to attach change feed: {:#}", e);
            app.set_status("Could not connect to the message feed", true);
        }
    }
}

/// React to one item from the change feed.
fn handle_feed_item(
    app: &mut App,
    item: Option<FeedItem>,
    watcher: &AuthWatcher,
    subscription: &mut Option<Subscription>,
) {
    match item {
        Some(Ok(event)) => app.handle_child_event(event),
        Some(Err(StreamError::AuthRevoked)) => {
            *subscription = None;
            app.feed_attached = false;
            watcher.signed_out();
        }
        Some(Err(e)) => {
            tracing::warn!("Change feed ended: {:#}", e);
            *subscription = None;
            app.feed_attached = false;
            app.set_status("Message feed disconnected", true);
        }
        None => {
            *subscription = None;
            app.feed_attached = false;
        }
    }
}

async fn handle_key(
    app: &mut App,
    key: KeyEvent,
    client: &Arc<ChatClient>,
    watcher: &AuthWatcher,
    feed_tx: &mpsc::Sender<FeedItem>,
    subscription: &mut Option<Subscription>,
) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Photo path entry overlay captures all input while open.
    if app.photo_prompt.is_some() {
        handle_photo_prompt_key(app, key, client).await;
        return;
    }

    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_exit = true;
        }
        KeyCode::Char('o') if ctrl => {
            sign_out(app, watcher);
        }
        KeyCode::Char('b') if ctrl => {
            toggle_pause(app, client, watcher, feed_tx, subscription).await;
        }
        KeyCode::Char('p') if ctrl => {
            app.photo_prompt = Some(String::new());
        }
        KeyCode::Tab => {
            app.active_pane = match app.active_pane {
                Pane::Messages => Pane::Compose,
                Pane::Compose => Pane::Messages,
            };
        }
        _ => match app.active_pane {
            Pane::Messages => handle_messages_key(app, key),
            Pane::Compose => handle_compose_key(app, key, client, ctrl).await,
        },
    }
}

fn handle_messages_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_exit = true,
        KeyCode::Up | KeyCode::Char('k') => app.messages.scroll_up(),
        KeyCode::Down | KeyCode::Char('j') => app.messages.scroll_down(),
        _ => {}
    }
}

async fn handle_compose_key(app: &mut App, key: KeyEvent, client: &Arc<ChatClient>, ctrl: bool) {
    match key.code {
        KeyCode::Char('u') if ctrl => app.compose.clear(),
        KeyCode::Enter => {
            // Disabled for empty/whitespace input; `send` returns None then.
            if let Some(text) = app.compose.send() {
                send_text(app, client, &text).await;
            }
        }
        KeyCode::Char(c) if !ctrl => app.compose.insert_char(c),
        KeyCode::Backspace => app.compose.backspace(),
        KeyCode::Delete => app.compose.delete(),
        KeyCode::Left => app.compose.move_left(),
        KeyCode::Right => app.compose.move_right(),
        KeyCode::Home => app.compose.move_home(),
        KeyCode::End => app.compose.move_end(),
        _ => {}
    }
}

async fn handle_photo_prompt_key(app: &mut App, key: KeyEvent, client: &Arc<ChatClient>) {
    match key.code {
        KeyCode::Esc => {
            app.photo_prompt = None;
        }
        KeyCode::Enter => {
            let path = app.photo_prompt.take().unwrap_or_default();
            if !path.trim().is_empty() {
                send_photo(app, client, PathBuf::from(path.trim())).await;
            }
        }
        KeyCode::Backspace => {
            if let Some(ref mut prompt) = app.photo_prompt {
                prompt.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(ref mut prompt) = app.photo_prompt {
                prompt.push(c);
            }
        }
        _ => {}
    }
}

/// Send a text message. There is no optimistic insert: the row appears when
/// the change feed delivers the addition, same as for every other
/// participant.
async fn send_text(app: &mut App, client: &ChatClient, text: &str) {
    if let Err(e) = api_messages::send_text(client, text).await {
        tracing::warn!("Send failed: {:#}", e);
        app.set_status("Message could not be sent", true);
    }
}

/// Upload a photo and append the matching photo message.
async fn send_photo(app: &mut App, client: &ChatClient, path: PathBuf) {
    app.set_status(format!("Uploading {}...", path.display()), false);
    match storage::upload_photo(client, &path).await {
        Ok(url) => {
            // The final write is fire-and-forget: no retry on failure.
            if let Err(e) = api_messages::send_photo_url(client, &url).await {
                tracing::warn!("Photo uploaded but message write failed: {:#}", e);
                app.set_status("Photo uploaded; message write did not complete", true);
            } else {
                app.set_status("Photo sent", false);
            }
        }
        Err(e) => {
            tracing::warn!("Photo upload failed: {:#}", e);
            app.set_status("Photo upload failed", true);
        }
    }
}

/// Explicit sign-out: clear stored credentials, then publish the
/// transition; cleanup happens in the auth branch of the select loop.
fn sign_out(app: &mut App, watcher: &AuthWatcher) {
    match Config::load() {
        Ok(mut config) => {
            config.clear_tokens();
            if let Err(e) = config.save() {
                tracing::warn!("Failed to persist sign-out: {:#}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to load config for sign-out: {:#}", e),
    }
    app.set_status("Signing out...", false);
    watcher.signed_out();
}

/// Pause detaches the feed and discards the rendered list; resume re-checks
/// the auth state and reattaches only if still signed in.
async fn toggle_pause(
    app: &mut App,
    client: &Arc<ChatClient>,
    watcher: &AuthWatcher,
    feed_tx: &mpsc::Sender<FeedItem>,
    subscription: &mut Option<Subscription>,
) {
    if app.paused {
        app.paused = false;
        match watcher.current() {
            AuthState::SignedIn { username } => {
                app.on_signed_in(username);
                attach_feed(client, feed_tx, subscription, app).await;
                app.set_status("Resumed", false);
            }
            AuthState::SignedOut => {
                app.on_signed_out();
                app.should_exit = true;
            }
        }
    } else {
        app.paused = true;
        if let Some(sub) = subscription.take() {
            sub.detach();
        }
        app.feed_attached = false;
        app.messages.clear();
        app.set_status("Paused (Ctrl+B to resume)", false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FriendlyMessage;
    use crate::tui::messages::RowBody;

    fn signed_in_app() -> App {
        App::new(AuthState::SignedIn {
            username: "Alice".to_string(),
        })
    }

    #[test]
    fn added_text_event_renders_text_row() {
        let mut app = signed_in_app();
        app.handle_child_event(ChildEvent::Added {
            key: "-N1".to_string(),
            message: FriendlyMessage::text("hi", "Alice", None),
        });

        let rows = app.messages.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sender, "Alice");
        assert_eq!(rows[0].body, RowBody::Text("hi".to_string()));
    }

    #[test]
    fn added_photo_event_renders_photo_row() {
        let mut app = signed_in_app();
        app.handle_child_event(ChildEvent::Added {
            key: "-N1".to_string(),
            message: FriendlyMessage::photo("http://x/y.jpg", "Bob", None),
        });

        let rows = app.messages.rows();
        assert_eq!(rows[0].sender, "Bob");
        assert_eq!(rows[0].body, RowBody::Photo("http://x/y.jpg".to_string()));
    }

    #[test]
    fn changed_event_updates_existing_row() {
        let mut app = signed_in_app();
        app.handle_child_event(ChildEvent::Added {
            key: "-N1".to_string(),
            message: FriendlyMessage::text("hi", "Alice", None),
        });
        app.handle_child_event(ChildEvent::Changed {
            key: "-N1".to_string(),
            message: FriendlyMessage::text("hi (edited)", "Alice", None),
        });

        let rows = app.messages.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, RowBody::Text("hi (edited)".to_string()));
    }

    #[test]
    fn removed_and_moved_events_are_visible_no_ops() {
        let mut app = signed_in_app();
        app.handle_child_event(ChildEvent::Added {
            key: "-N1".to_string(),
            message: FriendlyMessage::text("hi", "Alice", None),
        });

        app.handle_child_event(ChildEvent::Removed {
            key: "-N1".to_string(),
        });
        app.handle_child_event(ChildEvent::Moved {
            key: "-N1".to_string(),
        });

        // The row is untouched.
        assert_eq!(app.messages.rows().len(), 1);
        assert_eq!(app.messages.rows()[0].body, RowBody::Text("hi".to_string()));
    }

    #[test]
    fn sign_out_clears_list_and_later_events_change_nothing() {
        let mut app = signed_in_app();
        app.handle_child_event(ChildEvent::Added {
            key: "-N1".to_string(),
            message: FriendlyMessage::text("hi", "Alice", None),
        });
        assert_eq!(app.messages.rows().len(), 1);

        app.on_signed_out();
        assert!(app.messages.is_empty());

        // A straggler event (e.g. buffered before detach) has no effect.
        app.handle_child_event(ChildEvent::Added {
            key: "-N2".to_string(),
            message: FriendlyMessage::text("late", "Bob", None),
        });
        assert!(app.messages.is_empty());

        // Re-sign-in makes the pipeline live again.
        app.on_signed_in("Alice".to_string());
        app.handle_child_event(ChildEvent::Added {
            key: "-N3".to_string(),
            message: FriendlyMessage::text("back", "Alice", None),
        });
        assert_eq!(app.messages.rows().len(), 1);
    }
}
