//! In-memory `SlackApi` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::api::{Attachment, ConversationInfo, FileUpload, SlackApi, SlackUser};
use crate::error::TransportError;

type Post = (String, String, Vec<Attachment>);

#[derive(Default)]
pub(crate) struct FakeSlack {
    pub users: Vec<SlackUser>,
    /// Conversations returned by `channel_info`.
    pub public: HashMap<String, ConversationInfo>,
    /// Conversations returned by `conversation_info`.
    pub private: HashMap<String, ConversationInfo>,
    pub fail_users: bool,
    pub fail_sends: bool,
    /// Channel lookups never complete.
    pub hang_lookups: bool,
    pub sent: Mutex<Vec<(String, String)>>,
    pub uploaded: Mutex<Vec<FileUpload>>,
    pub posted: Mutex<Vec<Post>>,
    pub private_lookups: Mutex<Vec<(String, bool)>>,
    pub public_lookups: AtomicUsize,
}

impl FakeSlack {
    pub fn with_public(mut self, id: &str, name: &str) -> Self {
        self.public.insert(id.to_string(), conversation(id, name));
        self
    }

    pub fn with_private(mut self, id: &str, name: &str) -> Self {
        self.private.insert(id.to_string(), conversation(id, name));
        self
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<FileUpload> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posted.lock().unwrap().clone()
    }

    pub fn private_lookups(&self) -> Vec<(String, bool)> {
        self.private_lookups.lock().unwrap().clone()
    }

    fn send_error(method: &str) -> TransportError {
        TransportError::Api {
            method: method.to_string(),
            error: "not_in_channel".to_string(),
        }
    }
}

fn conversation(id: &str, name: &str) -> ConversationInfo {
    ConversationInfo {
        id: id.to_string(),
        name: name.to_string(),
        is_private: false,
        is_im: false,
        is_mpim: false,
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn list_users(&self) -> Result<Vec<SlackUser>, TransportError> {
        if self.fail_users {
            return Err(TransportError::Http {
                method: "users.list".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(self.users.clone())
    }

    async fn channel_info(&self, channel_id: &str) -> Result<ConversationInfo, TransportError> {
        self.public_lookups.fetch_add(1, Ordering::SeqCst);
        if self.hang_lookups {
            std::future::pending::<()>().await;
        }
        self.public
            .get(channel_id)
            .cloned()
            .ok_or_else(|| TransportError::NotPublic {
                id: channel_id.to_string(),
            })
    }

    async fn conversation_info(
        &self,
        channel_id: &str,
        bypass_cache: bool,
    ) -> Result<ConversationInfo, TransportError> {
        self.private_lookups
            .lock()
            .unwrap()
            .push((channel_id.to_string(), bypass_cache));
        if self.hang_lookups {
            std::future::pending::<()>().await;
        }
        self.private
            .get(channel_id)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                method: "conversations.info".into(),
                error: "channel_not_found".into(),
            })
    }

    async fn send_message(&self, channel_id: &str, text: &str) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(Self::send_error("chat.postMessage"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn post_attachments(
        &self,
        channel_id: &str,
        username: &str,
        attachments: &[Attachment],
    ) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(Self::send_error("chat.postMessage"));
        }
        self.posted.lock().unwrap().push((
            channel_id.to_string(),
            username.to_string(),
            attachments.to_vec(),
        ));
        Ok(())
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(Self::send_error("files.upload"));
        }
        self.uploaded.lock().unwrap().push(upload);
        Ok(())
    }
}
