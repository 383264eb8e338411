pub mod chzzk;
