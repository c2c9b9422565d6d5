mod helpers;

mod leaderboard;
mod matrix;
mod periodic;
