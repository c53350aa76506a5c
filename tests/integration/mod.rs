//! Integration tests driving the pkg-release binary

mod helpers;
mod test_commit;
mod test_gate;
mod test_push;
mod test_sign;
