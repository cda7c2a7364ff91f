pub mod auth_service;
pub use auth_service::{AuthError, AuthService};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod news_service;
pub use news_service::{NewsError, NewsService};

pub mod news_service_impl;
pub use news_service_impl::SeaOrmNewsService;
