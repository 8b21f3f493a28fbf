//! Login accounts for simulated actors.
//!
//! The application under test is seeded with a fixed roster of accounts;
//! [`AccountPool`] hands them out so that no two actors share a login.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::UserCode;

/// Credentials and identity of one user of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub code: UserCode,
    pub name: String,
    pub password: String,
    pub is_admin: bool,
}

impl UserAccount {
    pub fn student(index: usize) -> Self {
        let code = format!("S{:05}", index + 1);
        Self {
            name: format!("Student {}", index + 1),
            password: format!("{code}-pass"),
            code,
            is_admin: false,
        }
    }

    pub fn teacher(index: usize) -> Self {
        let code = format!("T{:05}", index + 1);
        Self {
            name: format!("Teacher {}", index + 1),
            password: format!("{code}-pass"),
            code,
            is_admin: true,
        }
    }
}

/// Hands out student accounts in order and exposes the fixed teacher list.
#[derive(Debug)]
pub struct AccountPool {
    next_student: AtomicUsize,
    teachers: Vec<UserAccount>,
}

impl AccountPool {
    pub fn new(teacher_count: usize) -> Self {
        Self {
            next_student: AtomicUsize::new(0),
            teachers: (0..teacher_count).map(UserAccount::teacher).collect(),
        }
    }

    /// Take the next unused student account.
    pub fn next_student(&self) -> UserAccount {
        let index = self.next_student.fetch_add(1, Ordering::Relaxed);
        UserAccount::student(index)
    }

    pub fn teachers(&self) -> &[UserAccount] {
        &self.teachers
    }

    pub fn issued_students(&self) -> usize {
        self.next_student.load(Ordering::Relaxed)
    }
}
