pub mod access_code;
pub mod hash;
pub mod html;
pub mod jwt;
