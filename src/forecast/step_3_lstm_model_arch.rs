// External imports
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Lstm, LstmConfig};
use burn::tensor::{activation, backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

/// Layer sizes of [`PriceLstm`]. Stored in the model metadata so weights can
/// be loaded into a matching module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceLstmConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub second_hidden_size: usize,
    pub dense_size: usize,
    pub output_size: usize,
}

impl Default for PriceLstmConfig {
    fn default() -> Self {
        Self {
            input_size: 1,
            hidden_size: 50,
            second_hidden_size: 50,
            dense_size: 25,
            output_size: 1,
        }
    }
}

impl PriceLstmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PriceLstm<B> {
        PriceLstm::new(self, device)
    }
}

/// Two stacked LSTM layers followed by a hidden dense layer and a linear head
#[derive(Module, Debug)]
pub struct PriceLstm<B: Backend> {
    input_size: usize,
    lstm: Lstm<B>,
    lstm_second: Lstm<B>,
    dense: Linear<B>,
    output_layer: Linear<B>,
}

impl<B: Backend> PriceLstm<B> {
    pub fn new(config: &PriceLstmConfig, device: &B::Device) -> Self {
        let lstm = LstmConfig::new(config.input_size, config.hidden_size, true).init(device);
        let lstm_second =
            LstmConfig::new(config.hidden_size, config.second_hidden_size, true).init(device);
        let dense = LinearConfig::new(config.second_hidden_size, config.dense_size).init(device);
        let output_layer = LinearConfig::new(config.dense_size, config.output_size).init(device);

        Self {
            input_size: config.input_size,
            lstm,
            lstm_second,
            dense,
            output_layer,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, sequence_length, input_size]
    ///
    /// # Returns
    ///
    /// Output tensor of shape [batch_size, output_size]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let (first_out, _) = self.lstm.forward(x, None);
        let (second_out, _) = self.lstm_second.forward(first_out, None);

        // Only the last time step feeds the dense head
        let [batch_size, seq_len, hidden] = second_out.dims();
        let last_step = second_out
            .narrow(1, seq_len - 1, 1)
            .reshape([batch_size, hidden]);

        let dense_out = activation::relu(self.dense.forward(last_step));
        self.output_layer.forward(dense_out)
    }
}
