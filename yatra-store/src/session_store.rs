use std::path::{Path, PathBuf};
use std::sync::RwLock;
use yatra_core::{Session, SessionProvider, UserProfile};

use crate::StoreResult;

/// Signed-in session kept on disk between runs
pub struct FileSessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl FileSessionStore {
    /// Restore the session saved by a previous run. A missing file means signed out; an
    /// unreadable one is logged and treated the same way.
    pub async fn init(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        let session = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => {
                    tracing::info!(uid = %session.user.uid, "Restored saved session");
                    Some(session)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Ignoring unreadable session file: {}", e);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            current: RwLock::new(session),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_session().is_some()
    }

    pub async fn sign_in(&self, token: String, user: UserProfile) -> StoreResult<Session> {
        let session = Session::new(token, user)?;
        write_atomic(&self.path, &serde_json::to_vec_pretty(&session)?).await?;

        self.set(Some(session.clone()));
        tracing::info!(uid = %session.user.uid, "Signed in");
        Ok(session)
    }

    /// Sign out and forget the saved session
    pub async fn teardown(&self) -> StoreResult<()> {
        self.set(None);
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!("Signed out");
        Ok(())
    }

    fn set(&self, session: Option<Session>) {
        match self.current.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }
}

impl SessionProvider for FileSessionStore {
    fn current_session(&self) -> Option<Session> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Write through a temp file and rename so readers never see a partial file
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}
