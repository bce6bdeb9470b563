pub mod user;
pub mod theme;
pub mod show;
pub mod dome;
pub mod session;
pub mod reservation;
pub mod ticket;

pub use user::User;
pub use theme::ShowTheme;
pub use show::AstronomyShow;
pub use dome::{DomeGeometry, PlanetariumDome};
pub use session::{SessionFilter, ShowSession, ShowSessionSummary};
pub use reservation::Reservation;
pub use ticket::{Ticket, TicketPosition};
