//! Recording fakes for the outbound services.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;

use super::{
    email::{EmailError, EmailSender, RenderedEmail},
    identity::{IdentityError, IdentityProvider, IdentityUser, NewIdentity},
};

#[derive(Default)]
pub struct FakeIdentity {
    next_id: Mutex<u32>,
    created: Mutex<Vec<IdentityUser>>,
    deleted: Mutex<Vec<String>>,
    resets: Mutex<Vec<(String, String)>>,
    rejected_emails: Mutex<HashSet<String>>,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create_user` fails for this address.
    pub fn reject(&self, email: &str) {
        self.rejected_emails.lock().unwrap().insert(email.to_string());
    }

    pub fn created(&self) -> Vec<IdentityUser> {
        self.created.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// (email, redirect) of every reset request.
    pub fn resets(&self) -> Vec<(String, String)> {
        self.resets.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn create_user(&self, user: &NewIdentity) -> Result<IdentityUser, IdentityError> {
        if self.rejected_emails.lock().unwrap().contains(&user.email) {
            return Err(IdentityError::AlreadyExists(user.email.clone()));
        }
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let created = IdentityUser {
            id: format!("identity-{next_id}"),
            email: user.email.clone(),
        };
        self.created.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn delete_user(&self, id: &str) -> Result<(), IdentityError> {
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), IdentityError> {
        self.resets
            .lock()
            .unwrap()
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl RecordingEmail {
    pub fn failing() -> Self {
        Self {
            failing: Mutex::new(true),
            ..Self::default()
        }
    }

    /// (recipient, subject) of every accepted email.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, to: &str, email: &RenderedEmail) -> Result<(), EmailError> {
        if *self.failing.lock().unwrap() {
            return Err(EmailError::Http {
                status: 500,
                body: "provider down".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), email.subject.to_string()));
        Ok(())
    }
}
