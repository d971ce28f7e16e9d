pub mod auth;
pub mod collaborators;
pub mod legacy;
pub mod mailer;
pub mod milestones;
pub mod oauth;
pub mod projects;
pub mod rate_limit;
pub mod seed;
pub mod uploads;
