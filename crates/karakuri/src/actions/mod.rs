//! Built-in actions.
//!
//! Every action here reports problems through its
//! [`ActionResult`](karakuri_core::ActionResult) and never fails any other way.

mod click;
mod form_submit;
mod navigate;
mod set_content;

pub use click::ClickAction;
pub use form_submit::FormSubmitAction;
pub use navigate::NavigateAction;
pub use set_content::SetContentAction;
