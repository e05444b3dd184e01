// SPDX-License-Identifier: MIT

pub use self::styled::Styled;

mod styled;
