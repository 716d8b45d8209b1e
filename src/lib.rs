//! Board ingest: bring local images and slide documents onto a shared
//! whiteboard.
//!
//! | Module     | Role                                                    |
//! |------------|---------------------------------------------------------|
//! | `ingest`   | Image-drop and document-conversion orchestration        |
//! | `geometry` | Points, sizes, camera mapping, display-size policy      |
//! | `canvas`   | Board capability trait and the frame-emitting canvas    |
//! | `storage`  | Object-store trait, upload adapter, HTTP multipart store|
//! | `convert`  | Conversion trait, adapter, HTTP conversion client       |
//! | `progress` | Progress events and sinks                               |
//! | `frame`    | Board wire frames and error codes                       |
//! | `config`   | Environment configuration                               |

pub mod canvas;
pub mod config;
pub mod convert;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod progress;
pub mod storage;

#[cfg(test)]
pub mod test_helpers;
