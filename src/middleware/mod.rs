pub mod permission_mw;
